//! Parsing of the model's `{"candidatos": [...]}` answer.

use serde_json::{Map, Value};

/// One per-candidate result, aligned by position with the batch input.
///
/// `raw` is the object exactly as the model returned it and is what gets
/// stored as the link rationale. The typed fields are lenient views over it.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateEvaluation {
    pub raw: Value,
    pub nombre: Option<String>,
    pub cedula: Option<String>,
    pub tipo_documento: Option<String>,
    pub ciudad: Option<String>,
    pub genero: Option<String>,
    pub movil: Option<String>,
    pub correo: Option<String>,
    pub score: Option<f64>,
    pub experiencia_en_anos: Option<f64>,
    pub tiempo_promedio_en_cada_trabajo: Option<f64>,
    pub nivel_educativo: Option<String>,
    pub edad: Option<f64>,
    pub status: Option<String>,
    pub habilidades_encontradas: Vec<String>,
    pub habilidades_solicitadas: Vec<String>,
}

impl CandidateEvaluation {
    pub fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            raw: Value::Object(object.clone()),
            nombre: text_field(object, "nombre"),
            cedula: text_field(object, "cedula"),
            tipo_documento: text_field(object, "tipo_documento"),
            ciudad: text_field(object, "ciudad"),
            genero: text_field(object, "genero"),
            movil: text_field(object, "movil"),
            correo: text_field(object, "correo"),
            score: number_field(object, "score"),
            experiencia_en_anos: number_field(object, "experiencia_en_anos"),
            tiempo_promedio_en_cada_trabajo: number_field(
                object,
                "tiempo_promedio_en_cada_trabajo",
            ),
            nivel_educativo: text_field(object, "nivel_educativo"),
            edad: number_field(object, "edad"),
            status: text_field(object, "status"),
            habilidades_encontradas: list_field(object, "habilidades_encontradas"),
            habilidades_solicitadas: list_field(object, "habilidades_solicitadas"),
        }
    }

    /// The raw object serialized for storage.
    pub fn rationale(&self) -> String {
        self.raw.to_string()
    }
}

/// Strings are trimmed; numbers (IDs, phones) are rendered as text.
fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_field(object: &Map<String, Value>, key: &str) -> Option<f64> {
    match object.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
}

fn list_field(object: &Map<String, Value>, key: &str) -> Vec<String> {
    match object.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

/// Strips markdown code fences around the payload, if any.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Extracts the first balanced JSON object from `content`.
fn extract_json(content: &str) -> &str {
    let Some(start) = content.find('{') else {
        return content;
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in content[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return &content[start..start + i + 1];
                }
            }
            _ => {}
        }
    }

    &content[start..]
}

/// Parses the completion text into per-candidate evaluations.
///
/// The error string describes why the payload was rejected.
pub fn parse_evaluations(content: &str) -> Result<Vec<CandidateEvaluation>, String> {
    let json = extract_json(strip_code_fences(content));
    let value: Value = serde_json::from_str(json).map_err(|e| format!("invalid JSON: {}", e))?;

    let candidates = value
        .get("candidatos")
        .and_then(Value::as_array)
        .ok_or_else(|| "missing 'candidatos' array".to_string())?;

    candidates
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_object()
                .map(CandidateEvaluation::from_object)
                .ok_or_else(|| format!("entry {} is not an object", i))
        })
        .collect()
}
