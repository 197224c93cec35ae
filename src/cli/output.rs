//! Output formatting for CLI commands.

use serde::{Deserialize, Serialize};

use crate::analysis::token::Token;
use crate::cli::args::{DynsynArgs, OutputFormat};
use crate::error::Result;
use crate::synonym::builder::SkippedRule;

/// Result structure for text analysis.
#[derive(Debug, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub source: String,
    pub entries: usize,
    pub tokens: Vec<Token>,
}

/// Result structure for checking a synonym source.
#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub source: String,
    pub format: String,
    pub rules: usize,
    pub entries: usize,
    pub max_input_words: usize,
    pub skipped: Vec<SkippedRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<Vec<EntryOutput>>,
}

/// One compiled table entry.
#[derive(Debug, Serialize, Deserialize)]
pub struct EntryOutput {
    pub input: String,
    pub outputs: Vec<String>,
}

/// Result of one watch round.
#[derive(Debug, Serialize, Deserialize)]
pub struct WatchRound {
    pub round: u64,
    pub version: u64,
    pub entries: usize,
    pub tokens: Vec<Token>,
}

/// Output a result in the requested format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &DynsynArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in human-readable format.
fn output_human<T: Serialize>(message: &str, result: &T, args: &DynsynArgs) -> Result<()> {
    if args.verbosity() > 0 {
        println!("{message}");
        println!();
    }

    let value = serde_json::to_value(result)?;
    let Some(obj) = value.as_object() else {
        println!("{}", format_value(&value));
        return Ok(());
    };

    for (key, val) in obj {
        match key.as_str() {
            "tokens" => {
                println!("tokens:");
                for token in val.as_array().into_iter().flatten() {
                    println!("  {}", format_token(token));
                }
            }
            "skipped" | "table" => {
                let items = val.as_array().map(Vec::as_slice).unwrap_or_default();
                println!("{key}: {}", items.len());
                for item in items {
                    println!("  {}", format_value(item));
                }
            }
            _ => println!("{key}: {}", format_value(val)),
        }
    }
    Ok(())
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &DynsynArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

/// Format a serialized token as `text@position[+length] (type)`.
fn format_token(token: &serde_json::Value) -> String {
    let field = |name: &str| token.get(name).and_then(|v| v.as_u64()).unwrap_or(0);
    let text = token.get("text").and_then(|t| t.as_str()).unwrap_or("");
    let kind = token.get("token_type").and_then(|t| t.as_str()).unwrap_or("");

    let mut out = format!("{text}@{}", field("position"));
    if field("position_length") > 1 {
        out.push_str(&format!("+{}", field("position_length")));
    }
    out.push_str(&format!(" ({kind})"));
    out
}

/// Format a JSON value for display.
fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            format!("[{}]", items.join(", "))
        }
        serde_json::Value::Object(obj) => {
            let items: Vec<String> = obj
                .iter()
                .map(|(k, v)| format!("{k}: {}", format_value(v)))
                .collect();
            format!("{{{}}}", items.join(", "))
        }
    }
}
