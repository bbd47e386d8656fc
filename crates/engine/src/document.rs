use std::sync::Arc;

use error::{ErrorCode, GraphqlError, Location};
use graphql_parser::{
    query::{Definition, Document, OperationDefinition, SelectionSet},
    Pos,
};
use sha2::{Digest, Sha256};

/// Hex encoded SHA-256 of the query text, used both for persisted queries and as the document
/// cache key.
pub fn query_hash(query: &str) -> String {
    hex::encode(Sha256::digest(query.as_bytes()))
}

/// A parsed executable document together with its source text.
#[derive(Debug)]
pub struct ParsedDocument {
    source: String,
    ast: Document<'static, String>,
}

impl ParsedDocument {
    pub fn parse(source: &str) -> Result<Arc<ParsedDocument>, GraphqlError> {
        let ast = graphql_parser::parse_query::<String>(source)
            .map_err(|err| GraphqlError::new(syntax_error_message(&err), ErrorCode::OperationParsingError))?
            .into_static();

        Ok(Arc::new(ParsedDocument {
            source: source.to_string(),
            ast,
        }))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Document<'static, String> {
        &self.ast
    }

    pub fn operations(&self) -> impl Iterator<Item = (usize, &OperationDefinition<'static, String>)> {
        self.ast
            .definitions
            .iter()
            .enumerate()
            .filter_map(|(index, definition)| match definition {
                Definition::Operation(operation) => Some((index, operation)),
                Definition::Fragment(_) => None,
            })
    }

    /// Selects the operation to execute. Without a name the document must contain a single
    /// operation.
    pub fn operation(&self, name: Option<&str>) -> Option<OperationRef> {
        let mut operations = self.operations();

        let (index, operation) = match name {
            Some(name) => operations.find(|(_, operation)| operation_name(operation) == Some(name))?,
            None => {
                let first = operations.next()?;
                if operations.next().is_some() {
                    return None;
                }
                first
            }
        };

        Some(OperationRef {
            index,
            name: operation_name(operation).map(str::to_string),
            kind: OperationKind::of(operation),
        })
    }

    pub fn definition(&self, operation: &OperationRef) -> Option<&OperationDefinition<'static, String>> {
        match self.ast.definitions.get(operation.index)? {
            Definition::Operation(definition) => Some(definition),
            Definition::Fragment(_) => None,
        }
    }

    /// Rough estimate of the memory held by the document, used to bound the document cache.
    pub fn estimated_size(&self) -> u32 {
        u32::try_from(self.source.len().saturating_mul(4)).unwrap_or(u32::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    pub(crate) fn of(operation: &OperationDefinition<'_, String>) -> Self {
        match operation {
            OperationDefinition::SelectionSet(_) | OperationDefinition::Query(_) => OperationKind::Query,
            OperationDefinition::Mutation(_) => OperationKind::Mutation,
            OperationDefinition::Subscription(_) => OperationKind::Subscription,
        }
    }
}

/// The operation selected for execution, pointing into its document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRef {
    pub index: usize,
    pub name: Option<String>,
    pub kind: OperationKind,
}

pub(crate) fn operation_name<'a>(operation: &'a OperationDefinition<'_, String>) -> Option<&'a str> {
    match operation {
        OperationDefinition::SelectionSet(_) => None,
        OperationDefinition::Query(query) => query.name.as_deref(),
        OperationDefinition::Mutation(mutation) => mutation.name.as_deref(),
        OperationDefinition::Subscription(subscription) => subscription.name.as_deref(),
    }
}

pub(crate) fn operation_selection_set<'a>(
    operation: &'a OperationDefinition<'static, String>,
) -> &'a SelectionSet<'static, String> {
    match operation {
        OperationDefinition::SelectionSet(selection_set) => selection_set,
        OperationDefinition::Query(query) => &query.selection_set,
        OperationDefinition::Mutation(mutation) => &mutation.selection_set,
        OperationDefinition::Subscription(subscription) => &subscription.selection_set,
    }
}

pub(crate) fn location(pos: Pos) -> Location {
    Location::new(
        u32::try_from(pos.line).unwrap_or(u32::MAX),
        u32::try_from(pos.column).unwrap_or(u32::MAX),
    )
}

fn syntax_error_message(err: &graphql_parser::query::ParseError) -> String {
    // The parser reports multi-line messages, the first line is the one worth showing.
    let message = err.to_string();
    let message = message.trim();
    format!("Syntax error: {}", message.lines().next().unwrap_or(message))
}
