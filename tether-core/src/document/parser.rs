use crate::document::PlanDocument;
use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
    Auto,
}

#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub document: PlanDocument,
    pub format: DocumentFormat,
}

pub fn parse_plan_str(input: &str, format: DocumentFormat) -> Result<ParsedDocument, ParseError> {
    match format {
        DocumentFormat::Json => Ok(ParsedDocument {
            document: serde_json::from_str(input)?,
            format,
        }),
        DocumentFormat::Yaml => Ok(ParsedDocument {
            document: serde_yaml::from_str(input)?,
            format,
        }),
        DocumentFormat::Auto => parse_auto(input),
    }
}

fn parse_auto(input: &str) -> Result<ParsedDocument, ParseError> {
    let trimmed = input.trim_start();
    if trimmed.is_empty() {
        return Err(ParseError::UnknownFormat);
    }

    // JSON always starts with `{` after trimming; YAML is a superset and serves as fallback.
    if trimmed.starts_with('{') {
        return match serde_json::from_str::<PlanDocument>(input) {
            Ok(document) => Ok(ParsedDocument {
                document,
                format: DocumentFormat::Json,
            }),
            Err(e) => serde_yaml::from_str::<PlanDocument>(input)
                .map(|document| ParsedDocument {
                    document,
                    format: DocumentFormat::Yaml,
                })
                .map_err(|_| ParseError::Json(e)),
        };
    }

    serde_yaml::from_str::<PlanDocument>(input)
        .map(|document| ParsedDocument {
            document,
            format: DocumentFormat::Yaml,
        })
        .map_err(ParseError::Yaml)
}
