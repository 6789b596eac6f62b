use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{ingredients::repo_types::IngredientId, recipes::repo_types::RecipeId};

/// How much of a catalog ingredient one recipe needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct RecipeIngredientLink {
    pub recipe_id: RecipeId,
    pub ingredient_id: IngredientId,
    pub quantity: i32,
}

/// One consolidated row of a shopping list. Built per request, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedLine {
    pub ingredient_id: IngredientId,
    pub ingredient_name: String,
    pub measurement_unit: String,
    pub total_quantity: i64,
}

/// What the aggregator does with a link whose ingredient is gone from the catalog.
///
/// Deleting an ingredient cascades to its links, so with the Postgres store this
/// only happens when the ingredient is deleted between the link query and the
/// catalog query of one request. The two lookups do not share a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingIngredientPolicy {
    /// Drop the ingredient from the list and log a warning.
    Skip,
    /// Abort the whole report with `NotFound`.
    Fail,
}

impl FromStr for MissingIngredientPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "fail" => Ok(Self::Fail),
            other => Err(format!("expected `skip` or `fail`, got `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ReportFormat {
    #[serde(rename = "txt", alias = "text", alias = "plain")]
    PlainText,
    #[serde(rename = "pdf", alias = "document")]
    Document,
}

impl ReportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            Self::PlainText => "text/plain; charset=utf-8",
            Self::Document => "application/pdf",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Self::PlainText => "shopping_list.txt",
            Self::Document => "shopping_list.pdf",
        }
    }

    /// `Content-Disposition` value that makes clients save the report as a file.
    pub fn content_disposition(self) -> &'static str {
        match self {
            Self::PlainText => "attachment; filename=\"shopping_list.txt\"",
            Self::Document => "attachment; filename=\"shopping_list.pdf\"",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "txt" | "text" | "plain" => Ok(Self::PlainText),
            "pdf" | "document" => Ok(Self::Document),
            other => Err(format!("expected `txt` or `pdf`, got `{other}`")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("SKIP".parse(), Ok(MissingIngredientPolicy::Skip));
        assert_eq!("fail".parse(), Ok(MissingIngredientPolicy::Fail));
        assert!("maybe".parse::<MissingIngredientPolicy>().is_err());
    }

    #[test]
    fn format_accepts_query_spellings() {
        let q: ReportFormat = serde_json::from_str("\"pdf\"").unwrap();
        assert_eq!(q, ReportFormat::Document);
        let q: ReportFormat = serde_json::from_str("\"text\"").unwrap();
        assert_eq!(q, ReportFormat::PlainText);
        assert_eq!(ReportFormat::Document.file_name(), "shopping_list.pdf");
        assert_eq!(ReportFormat::PlainText.content_type(), "text/plain; charset=utf-8");
    }

    #[test]
    fn disposition_names_the_report_file() {
        for format in [ReportFormat::PlainText, ReportFormat::Document] {
            assert_eq!(
                format.content_disposition(),
                format!("attachment; filename=\"{}\"", format.file_name())
            );
        }
    }
}
