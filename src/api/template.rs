//! `{{.Field}}` name templates used to build namespaces, clusters and keys.

use crate::api::config::ConfigParamConfig;
use crate::api::error::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Field {
    Category,
    ClientServiceName,
    ServerServiceName,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Text(String),
    Field(Field),
}

/// A parsed template. Parsing happens once, rendering cannot fail.
#[derive(Clone, Debug)]
pub(crate) struct NameTemplate {
    segments: Vec<Segment>,
}

impl NameTemplate {
    pub(crate) fn parse(template: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::Template {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Text(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| invalid("unclosed action"))?;
            let action = after[..end].trim();
            let field = match action {
                ".Category" => Field::Category,
                ".ClientServiceName" => Field::ClientServiceName,
                ".ServerServiceName" => Field::ServerServiceName,
                _ => return Err(invalid(&format!("unknown field {action:?}"))),
            };
            segments.push(Segment::Field(field));
            rest = &after[end + 2..];
        }
        if rest.contains("}}") {
            return Err(invalid("unexpected \"}}\""));
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }
        Ok(NameTemplate { segments })
    }

    pub(crate) fn render(&self, cpc: &ConfigParamConfig) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Field(Field::Category) => out.push_str(&cpc.category),
                Segment::Field(Field::ClientServiceName) => {
                    out.push_str(&cpc.client_service_name)
                }
                Segment::Field(Field::ServerServiceName) => {
                    out.push_str(&cpc.server_service_name)
                }
            }
        }
        out
    }
}
