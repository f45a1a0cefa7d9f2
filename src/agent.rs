//! Bucle de razonamiento estilo ReAct sobre el modelo de chat.
//!
//! Cada iteración el modelo decide entre invocar una herramienta por nombre o
//! emitir la respuesta final. La salida cruda del modelo se reduce a una unión
//! etiquetada (`ModelOutput`) con un parser dedicado; los fallos de parseo se
//! devuelven al modelo como observación correctiva un número acotado de veces.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{debug, warn};

use crate::llm::LlmEngine;
use crate::session::BASELINE_SYSTEM_PROMPT;
use crate::tools::ToolSet;

/// Fallos de parseo consecutivos tolerados antes de abortar la petición.
const MAX_PARSE_RETRIES: usize = 3;

/// Salida de una iteración del modelo, ya clasificada.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelOutput {
    ToolCall { name: String, input: String },
    FinalAnswer(String),
    ParseError(String),
}

/// Motor del agente: modelo + herramientas + límite de pasos.
#[derive(Clone)]
pub struct AgentEngine {
    llm: LlmEngine,
    tools: Arc<ToolSet>,
    max_steps: usize,
}

impl AgentEngine {
    pub fn new(llm: LlmEngine, tools: Arc<ToolSet>, max_steps: usize) -> Self {
        Self { llm, tools, max_steps }
    }

    /// Ejecuta el bucle completo para una pregunta, partiendo de la
    /// transcripción de la sesión. Devuelve la respuesta final del modelo o un
    /// error si se agotan los pasos o el modelo no produce salida parseable.
    pub async fn run(&self, transcript: &str, question: &str) -> Result<String> {
        let mut scratchpad = String::new();
        let mut parse_failures = 0;

        for step in 0..self.max_steps {
            let prompt = self.render_prompt(transcript, question, &scratchpad);
            let raw = self.llm.complete(BASELINE_SYSTEM_PROMPT, &prompt).await?;
            debug!("Paso {step} del agente:\n{raw}");

            match parse_model_output(&raw) {
                ModelOutput::FinalAnswer(answer) => return Ok(answer),

                ModelOutput::ToolCall { name, input } => {
                    parse_failures = 0;
                    let observation = if self.tools.contains(&name) {
                        match self.tools.call(&name, &input).await {
                            Ok(observation) => observation,
                            Err(err) => {
                                warn!("La herramienta '{name}' falló: {err}");
                                format!("Tool error: {err}")
                            }
                        }
                    } else {
                        format!(
                            "'{name}' is not a valid tool, try one of [{}].",
                            self.tools.names()
                        )
                    };

                    push_step(&mut scratchpad, &raw, &observation);
                }

                ModelOutput::ParseError(reason) => {
                    parse_failures += 1;
                    warn!("Salida del modelo no parseable (intento {parse_failures}): {reason}");
                    if parse_failures >= MAX_PARSE_RETRIES {
                        return Err(anyhow!(
                            "El modelo produjo {MAX_PARSE_RETRIES} salidas no parseables seguidas"
                        ));
                    }
                    push_step(
                        &mut scratchpad,
                        &raw,
                        "Invalid format. Either call a tool with 'Action:' and 'Action Input:' \
                         or answer with 'Final Answer:'.",
                    );
                }
            }
        }

        Err(anyhow!(
            "El agente agotó el máximo de {} pasos sin producir una respuesta final",
            self.max_steps
        ))
    }

    /// Plantilla ReAct de chat: herramientas, formato, historial previo,
    /// pregunta nueva y scratchpad acumulado.
    fn render_prompt(&self, transcript: &str, question: &str, scratchpad: &str) -> String {
        let tool_lines = self
            .tools
            .specs()
            .iter()
            .map(|s| format!("> {}: {}", s.name, s.description))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "TOOLS:\n\
             ------\n\
             Assistant has access to the following tools:\n\n\
             {tool_lines}\n\n\
             To use a tool, please use the following format:\n\n\
             ```\n\
             Thought: Do I need to use a tool? Yes\n\
             Action: the action to take, should be one of [{names}]\n\
             Action Input: the input to the action\n\
             Observation: the result of the action\n\
             ```\n\n\
             When you have a response to say to the Human, or if you do not need to use a tool, \
             you MUST use the format:\n\n\
             ```\n\
             Thought: Do I need to use a tool? No\n\
             Final Answer: [your response here]\n\
             ```\n\n\
             Begin!\n\n\
             Previous conversation history:\n\
             {transcript}\n\n\
             New input: {question}\n\
             {scratchpad}",
            names = self.tools.names(),
        )
    }
}

/// Añade al scratchpad la salida del modelo y la observación resultante,
/// dejando abierto el siguiente pensamiento.
fn push_step(scratchpad: &mut String, raw: &str, observation: &str) {
    scratchpad.push_str(raw.trim());
    scratchpad.push_str("\nObservation: ");
    scratchpad.push_str(observation);
    scratchpad.push_str("\nThought: ");
}

/// Clasifica la salida cruda del modelo.
///
/// Reglas: una invocación de herramienta exige `Action:` y `Action Input:`;
/// una respuesta final exige `Final Answer:`; la presencia de ambas a la vez,
/// o de ninguna, es un fallo de parseo.
pub fn parse_model_output(raw: &str) -> ModelOutput {
    let has_action = raw.contains("Action:");
    let has_final = raw.contains("Final Answer:");

    if has_action && has_final {
        return ModelOutput::ParseError(
            "la salida contiene una acción y una respuesta final a la vez".to_string(),
        );
    }

    if has_action {
        let Some(name) = section_after(raw, "Action:") else {
            return ModelOutput::ParseError("falta el nombre de la acción".to_string());
        };
        let Some(input) = section_after(raw, "Action Input:") else {
            return ModelOutput::ParseError(
                "hay 'Action:' pero falta 'Action Input:'".to_string(),
            );
        };
        return ModelOutput::ToolCall {
            name: first_line(&name),
            input: strip_quotes(&first_block(&input)),
        };
    }

    if has_final {
        let answer = raw
            .split("Final Answer:")
            .nth(1)
            .unwrap_or_default()
            .trim()
            .to_string();
        if answer.is_empty() {
            return ModelOutput::ParseError("respuesta final vacía".to_string());
        }
        return ModelOutput::FinalAnswer(answer);
    }

    ModelOutput::ParseError(
        "la salida no contiene ni una acción ni una respuesta final".to_string(),
    )
}

fn section_after(raw: &str, marker: &str) -> Option<String> {
    raw.split(marker).nth(1).map(|rest| rest.trim().to_string())
}

/// Primera línea no vacía de un fragmento.
fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or_default().trim().to_string()
}

/// Texto hasta el siguiente marcador del formato ReAct (u el final).
fn first_block(text: &str) -> String {
    let end = ["Observation:", "Thought:", "Action:"]
        .iter()
        .filter_map(|marker| text.find(marker))
        .min()
        .unwrap_or(text.len());
    text[..end].trim().to_string()
}

fn strip_quotes(text: &str) -> String {
    text.trim()
        .trim_matches('"')
        .trim_matches('`')
        .trim()
        .to_string()
}
