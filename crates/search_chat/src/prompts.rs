//! Prompt templates sent to the models
//!
//! The product speaks Spanish, so dates and the search instructions are
//! rendered in Spanish. The plain preamble keeps its English wording.

use chrono::{DateTime, Locale, Local};

/// Sentence the model must answer with when the search context is not enough
pub const NOT_FOUND_SENTENCE: &str =
    "No encontré información relevante sobre eso en la búsqueda que realicé.";

/// Long date such as `lunes, 21 de octubre de 2024`
pub fn long_date(now: &DateTime<Local>) -> String {
    now.format_localized("%A, %-d de %B de %Y", Locale::es_ES)
        .to_string()
}

/// Wall-clock time as `HH:MM:SS`
pub fn clock_time(now: &DateTime<Local>) -> String {
    now.format("%H:%M:%S").to_string()
}

/// Prompt used when search mode is off
pub fn preamble_prompt(user_prompt: &str, now: &DateTime<Local>) -> String {
    format!(
        "System Preamble: Current date is {}.\n\n{user_prompt}",
        long_date(now)
    )
}

/// Instruction that turns a free-form request into a search engine query
pub fn query_rewrite_prompt(user_prompt: &str) -> String {
    format!(
        "**Instrucción de Sistema:** Eres un motor de extracción de palabras clave para búsquedas web. \
Tu única tarea es convertir la petición de un usuario en una consulta de búsqueda óptima y concisa para un motor de búsqueda estándar.\n\
- Elimina frases conversacionales como \"puedes buscar\", \"quién es\", \"dime sobre\", \"encuentra información de\".\n\
- Si se menciona un sitio específico (ej. \"en LinkedIn\", \"en Wikipedia\"), conviértelo a la sintaxis `site:sitio.com`.\n\
- Tu respuesta debe ser *únicamente* la consulta de búsqueda resultante, sin ninguna otra palabra o explicación.\n\
\n\
**Ejemplos:**\n\
- Usuario: \"puedes buscar en internet especialmente en linkedin quien es kelvin jose familia\"\n\
- Respuesta: Kelvin Jose Familia Adames site:linkedin.com\n\
\n\
- Usuario: \"cuál es la capital de Mongolia\"\n\
- Respuesta: capital de Mongolia\n\
\n\
**Petición del Usuario a Procesar:**\n\
\"{user_prompt}\""
    )
}

/// Wraps the search results and the original question in an instruction
/// that restricts the model to the fetched context.
pub fn grounded_prompt(
    original_prompt: &str,
    search_results: &str,
    now: &DateTime<Local>,
) -> String {
    let context = format!(
        "Fecha y hora actual: {}, {}.\n\nResultados de búsqueda en Internet:\n{search_results}",
        long_date(now),
        clock_time(now)
    );

    format!(
        "**Instrucción Principal:** Eres un asistente experto que responde a la pregunta del usuario basándose \
*únicamente* en la información proporcionada en el siguiente contexto. Ignora por completo tu conocimiento previo. \
Si la respuesta no se encuentra de forma clara en el contexto, responde \"{NOT_FOUND_SENTENCE}\". \
Resume los hallazgos de manera clara y coherente.\n\
--- INICIO DEL CONTEXTO ---\n\
{}\n\
--- FIN DEL CONTEXTO ---\n\
**Tarea:** Usando solo la información del contexto anterior, responde de manera exhaustiva a la siguiente pregunta original del usuario.\n\
**Pregunta original del usuario:** \"{original_prompt}\"",
        context.trim()
    )
    .trim()
    .to_string()
}
