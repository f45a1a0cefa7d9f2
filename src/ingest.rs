//! Ingesta del corpus documental: carga de ficheros por extensión y troceado
//! en chunks solapados listos para vectorizar.

use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use mime_guess::MimeGuess;
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::models::{Chunk, Document};

/// Extensiones soportadas; cualquier otra se omite en silencio.
const SUPPORTED_EXTENSIONS: [&str; 3] = ["pdf", "txt", "docx"];

/// Carga todos los documentos soportados del directorio indicado (sin recursión).
///
/// Con `skip_errors` a `false` (el valor por defecto) cualquier fichero corrupto
/// o ilegible aborta el arranque: no existe un índice parcial de respaldo.
/// Con `skip_errors` a `true` el fichero se omite con un aviso.
pub fn load_documents(dir: &Path, skip_errors: bool) -> Result<Vec<Document>> {
    if !dir.is_dir() {
        return Err(anyhow!("La ruta no es un directorio: {}", dir.display()));
    }

    let mut documents = Vec::new();

    let entries = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file());

    for entry in entries {
        let path = entry.path();
        let extension = path
            .extension()
            .and_then(std::ffi::OsStr::to_str)
            .map(str::to_lowercase)
            .unwrap_or_default();

        if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            info!(
                "Omitiendo fichero con extensión no soportada ('.{}'): {}",
                extension,
                path.display()
            );
            continue;
        }

        let extracted = match extension.as_str() {
            "pdf" => pdf_extract::extract_text(path)
                .map_err(|e| anyhow!("No se pudo extraer texto del PDF: {e}")),
            "txt" => fs::read_to_string(path)
                .map_err(|e| anyhow!("No se pudo leer el fichero de texto: {e}")),
            "docx" => extract_docx(path),
            _ => unreachable!("extensión ya filtrada"),
        };

        let text = match extracted {
            Ok(text) => text,
            Err(err) => {
                if skip_errors {
                    warn!("Omitiendo {}: {err}", path.display());
                    continue;
                }
                return Err(err.context(format!("Error cargando {}", path.display())));
            }
        };

        let path_str = path.to_string_lossy().to_string();
        let filename = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path_str.clone());
        let mime_type = MimeGuess::from_path(path).first().map(|m| m.to_string());

        let document = Document {
            id: Uuid::new_v4().to_string(),
            source: path_str,
            filename,
            mime_type,
            text,
        };
        info!(
            "Cargado {} ({}, {} caracteres)",
            path.display(),
            document.mime_type.as_deref().unwrap_or("tipo desconocido"),
            document.text.chars().count()
        );
        documents.push(document);
    }

    Ok(documents)
}

/// Extrae el texto plano de un `.docx` leyendo `word/document.xml` del ZIP.
fn extract_docx(path: &Path) -> Result<String> {
    let file = fs::File::open(path)
        .with_context(|| format!("No se pudo abrir el DOCX: {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("El DOCX no es un ZIP válido: {}", path.display()))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .with_context(|| format!("El DOCX no contiene word/document.xml: {}", path.display()))?
        .read_to_string(&mut xml)
        .context("No se pudo leer word/document.xml")?;

    Ok(extract_docx_text(&xml))
}

/// Recorre el XML de WordprocessingML y concatena el contenido de los nodos
/// `<w:t>`, un párrafo `<w:p>` por línea.
fn extract_docx_text(xml: &str) -> String {
    let mut result = String::new();

    for paragraph in xml.split("<w:p").skip(1) {
        let paragraph = match paragraph.find("</w:p>") {
            Some(end) => &paragraph[..end],
            None => paragraph,
        };

        let mut para_text = String::new();
        for run in paragraph.split("<w:t").skip(1) {
            let Some(open_end) = run.find('>') else { continue };
            let content = &run[open_end + 1..];
            let Some(close) = content.find("</w:t>") else { continue };
            para_text.push_str(&content[..close]);
        }

        if !para_text.is_empty() {
            if !result.is_empty() {
                result.push('\n');
            }
            result.push_str(&para_text);
        }
    }

    result
}

/// Trocea los documentos, en orden, en chunks de como mucho `size` caracteres
/// donde chunks consecutivos del mismo documento comparten `overlap` caracteres.
///
/// Determinista: la misma entrada produce siempre los mismos textos de chunk.
/// Un documento que cabe entero en `size` es un único chunk.
pub fn chunk_documents(documents: &[Document], size: usize, overlap: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for document in documents {
        for (index, text) in split_text(&document.text, size, overlap).into_iter().enumerate() {
            chunks.push(Chunk {
                id: Uuid::new_v4().to_string(),
                document_id: document.id.clone(),
                source: document.source.clone(),
                index,
                text,
            });
        }
    }

    chunks
}

/// Ventana deslizante sobre caracteres: cada chunk no final mide exactamente
/// `size` y el siguiente arranca `size - overlap` caracteres más adelante.
fn split_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    assert!(overlap < size, "el solapamiento debe ser menor que el tamaño de chunk");

    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    if chars.len() <= size {
        return vec![text.to_string()];
    }

    let step = size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn doc(text: &str) -> Document {
        Document {
            id: "doc-1".to_string(),
            source: "memoria".to_string(),
            filename: "memoria.txt".to_string(),
            mime_type: None,
            text: text.to_string(),
        }
    }

    #[test]
    fn documento_corto_es_un_unico_chunk() {
        let chunks = split_text("breve", 1500, 200);
        assert_eq!(chunks, vec!["breve".to_string()]);
    }

    #[test]
    fn texto_vacio_no_produce_chunks() {
        assert!(split_text("", 1500, 200).is_empty());
    }

    #[test]
    fn chunks_no_finales_miden_exactamente_el_tamano() {
        let text: String = std::iter::repeat('x').take(4000).collect();
        let chunks = split_text(&text, 1500, 200);
        for chunk in &chunks[..chunks.len() - 1] {
            assert_eq!(chunk.chars().count(), 1500);
        }
        assert!(chunks.last().unwrap().chars().count() <= 1500);
    }

    #[test]
    fn recortar_el_solapamiento_reconstruye_el_original() {
        let text: String = (0..5000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let size = 1500;
        let overlap = 200;
        let chunks = split_text(&text, size, overlap);
        assert!(chunks.len() > 1);

        let mut rebuilt: String = chunks[0].clone();
        for chunk in &chunks[1..] {
            rebuilt.extend(chunk.chars().skip(overlap));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn el_troceado_es_determinista_y_conserva_el_orden() {
        let docs = vec![doc(&"a".repeat(3000)), doc(&"b".repeat(100))];
        let a = chunk_documents(&docs, 1500, 200);
        let b = chunk_documents(&docs, 1500, 200);

        let texts_a: Vec<&str> = a.iter().map(|c| c.text.as_str()).collect();
        let texts_b: Vec<&str> = b.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts_a, texts_b);

        // Los índices reinician por documento y respetan el orden de entrada.
        assert_eq!(a.first().unwrap().index, 0);
        assert_eq!(a.last().unwrap().text, "b".repeat(100));
        assert_eq!(a.last().unwrap().index, 0);
    }

    #[test]
    fn solo_se_cargan_las_extensiones_soportadas() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ley.txt"), "texto de la ley").unwrap();
        std::fs::write(dir.path().join("notas.md"), "apuntes").unwrap();
        std::fs::write(dir.path().join("datos.csv"), "a,b,c").unwrap();

        let docs = load_documents(dir.path(), false).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].filename, "ley.txt");
        assert_eq!(docs[0].text, "texto de la ley");
        assert_eq!(docs[0].mime_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn un_docx_minimo_se_extrae_correctamente() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contrato.docx");

        let file = std::fs::File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer
            .write_all(
                br#"<w:document><w:body><w:p><w:r><w:t>Primera parte.</w:t></w:r></w:p><w:p><w:r><w:t xml:space="preserve">Segunda </w:t></w:r><w:r><w:t>parte.</w:t></w:r></w:p></w:body></w:document>"#,
            )
            .unwrap();
        writer.finish().unwrap();

        let docs = load_documents(dir.path(), false).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "Primera parte.\nSegunda parte.");
    }

    #[test]
    fn extraccion_de_wordprocessingml() {
        let xml = r#"<w:p><w:t>Hola</w:t><w:t> mundo</w:t></w:p><w:p><w:t>Adiós</w:t></w:p>"#;
        assert_eq!(extract_docx_text(xml), "Hola mundo\nAdiós");
    }
}
