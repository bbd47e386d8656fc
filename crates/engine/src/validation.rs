use std::collections::{HashMap, HashSet};

use error::{ErrorCode, GraphqlError};
use graphql_parser::{
    query::{Definition, FragmentDefinition, OperationDefinition, Selection, SelectionSet, TypeCondition},
    Pos,
};

use crate::{
    document::{self, OperationKind, ParsedDocument},
    schema::Schema,
};

/// What a rule can look at.
pub struct ValidationContext<'a> {
    pub schema: &'a Schema,
    pub document: &'a ParsedDocument,
}

impl<'a> ValidationContext<'a> {
    fn fragments(&self) -> HashMap<&'a str, &'a FragmentDefinition<'static, String>> {
        self.document
            .ast()
            .definitions
            .iter()
            .filter_map(|definition| match definition {
                Definition::Fragment(fragment) => Some((fragment.name.as_str(), fragment)),
                Definition::Operation(_) => None,
            })
            .collect()
    }
}

pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn validate(&self, ctx: &ValidationContext<'_>, errors: &mut Vec<GraphqlError>);
}

pub(crate) fn default_rules() -> Vec<Box<dyn ValidationRule>> {
    vec![
        Box::new(ExecutableOperations),
        Box::new(UniqueOperationNames),
        Box::new(LoneAnonymousOperation),
        Box::new(KnownFragments),
        Box::new(FieldsOnCorrectType),
    ]
}

/// Runs the default rules followed by the extra ones.
pub fn validate(
    schema: &Schema,
    document: &ParsedDocument,
    extra_rules: &[std::sync::Arc<dyn ValidationRule>],
) -> Vec<GraphqlError> {
    let ctx = ValidationContext { schema, document };
    let mut errors = Vec::new();

    for rule in default_rules() {
        rule.validate(&ctx, &mut errors);
    }

    for rule in extra_rules {
        let before = errors.len();
        rule.validate(&ctx, &mut errors);
        if errors.len() > before {
            tracing::debug!(rule = rule.name(), "custom validation rule rejected the document");
        }
    }

    errors
}

fn validation_error(message: String, pos: Pos) -> GraphqlError {
    GraphqlError::new(message, ErrorCode::OperationValidationError).with_location(document::location(pos))
}

fn operation_position(operation: &OperationDefinition<'_, String>) -> Pos {
    match operation {
        OperationDefinition::SelectionSet(selection_set) => selection_set.span.0,
        OperationDefinition::Query(query) => query.position,
        OperationDefinition::Mutation(mutation) => mutation.position,
        OperationDefinition::Subscription(subscription) => subscription.position,
    }
}

struct ExecutableOperations;

impl ValidationRule for ExecutableOperations {
    fn name(&self) -> &'static str {
        "ExecutableOperations"
    }

    fn validate(&self, ctx: &ValidationContext<'_>, errors: &mut Vec<GraphqlError>) {
        if ctx.document.operations().next().is_none() {
            errors.push(GraphqlError::new(
                "Document must contain at least one operation.",
                ErrorCode::OperationValidationError,
            ));
        }
    }
}

struct UniqueOperationNames;

impl ValidationRule for UniqueOperationNames {
    fn name(&self) -> &'static str {
        "UniqueOperationNames"
    }

    fn validate(&self, ctx: &ValidationContext<'_>, errors: &mut Vec<GraphqlError>) {
        let mut seen = HashSet::new();

        for (_, operation) in ctx.document.operations() {
            if let Some(name) = document::operation_name(operation) {
                if !seen.insert(name) {
                    errors.push(validation_error(
                        format!("There can be only one operation named \"{name}\"."),
                        operation_position(operation),
                    ));
                }
            }
        }
    }
}

struct LoneAnonymousOperation;

impl ValidationRule for LoneAnonymousOperation {
    fn name(&self) -> &'static str {
        "LoneAnonymousOperation"
    }

    fn validate(&self, ctx: &ValidationContext<'_>, errors: &mut Vec<GraphqlError>) {
        if ctx.document.operations().count() < 2 {
            return;
        }

        for (_, operation) in ctx.document.operations() {
            if document::operation_name(operation).is_none() {
                errors.push(validation_error(
                    "This anonymous operation must be the only defined operation.".to_string(),
                    operation_position(operation),
                ));
            }
        }
    }
}

struct KnownFragments;

impl ValidationRule for KnownFragments {
    fn name(&self) -> &'static str {
        "KnownFragments"
    }

    fn validate(&self, ctx: &ValidationContext<'_>, errors: &mut Vec<GraphqlError>) {
        let fragments = ctx.fragments();

        for definition in &ctx.document.ast().definitions {
            let selection_set = match definition {
                Definition::Operation(operation) => document::operation_selection_set(operation),
                Definition::Fragment(fragment) => &fragment.selection_set,
            };
            check_spreads(selection_set, &fragments, errors);
        }
    }
}

fn check_spreads(
    selection_set: &SelectionSet<'static, String>,
    fragments: &HashMap<&str, &FragmentDefinition<'static, String>>,
    errors: &mut Vec<GraphqlError>,
) {
    for selection in &selection_set.items {
        match selection {
            Selection::Field(field) => check_spreads(&field.selection_set, fragments, errors),
            Selection::InlineFragment(fragment) => check_spreads(&fragment.selection_set, fragments, errors),
            Selection::FragmentSpread(spread) => {
                if !fragments.contains_key(spread.fragment_name.as_str()) {
                    errors.push(validation_error(
                        format!("Unknown fragment \"{}\".", spread.fragment_name),
                        spread.position,
                    ));
                }
            }
        }
    }
}

struct FieldsOnCorrectType;

impl ValidationRule for FieldsOnCorrectType {
    fn name(&self) -> &'static str {
        "FieldsOnCorrectType"
    }

    fn validate(&self, ctx: &ValidationContext<'_>, errors: &mut Vec<GraphqlError>) {
        let mut walker = FieldWalker {
            schema: ctx.schema,
            fragments: ctx.fragments(),
            visited_fragments: HashSet::new(),
            errors,
        };

        for (_, operation) in ctx.document.operations() {
            let root = match OperationKind::of(operation) {
                OperationKind::Query => Some(ctx.schema.query_type()),
                OperationKind::Mutation => ctx.schema.mutation_type(),
                OperationKind::Subscription => ctx.schema.subscription_type(),
            };

            let Some(root) = root else {
                walker.errors.push(validation_error(
                    format!(
                        "Schema is not configured to execute {} operation.",
                        OperationKind::of(operation)
                    ),
                    operation_position(operation),
                ));
                continue;
            };

            walker.visit(root, document::operation_selection_set(operation), true);
        }
    }
}

struct FieldWalker<'a, 'e> {
    schema: &'a Schema,
    fragments: HashMap<&'a str, &'a FragmentDefinition<'static, String>>,
    visited_fragments: HashSet<(&'a str, &'a str)>,
    errors: &'e mut Vec<GraphqlError>,
}

impl<'a> FieldWalker<'a, '_> {
    fn visit(&mut self, parent_type: &'a str, selection_set: &'a SelectionSet<'static, String>, is_root: bool) {
        for selection in &selection_set.items {
            match selection {
                Selection::Field(field) => {
                    let name = field.name.as_str();

                    if name == "__typename" || (is_root && (name == "__schema" || name == "__type")) {
                        continue;
                    }

                    let Some(definition) = self.schema.field(parent_type, name) else {
                        self.errors.push(validation_error(
                            format!("Cannot query field \"{name}\" on type \"{parent_type}\"."),
                            field.position,
                        ));
                        continue;
                    };

                    let is_composite = self
                        .schema
                        .get_type(&definition.ty.named)
                        .is_some_and(|ty| ty.kind.is_composite());

                    if is_composite {
                        self.visit(&definition.ty.named, &field.selection_set, false);
                    } else if !field.selection_set.items.is_empty() {
                        self.errors.push(validation_error(
                            format!(
                                "Field \"{name}\" must not have a selection since type \"{}\" has no subfields.",
                                definition.ty.display
                            ),
                            field.position,
                        ));
                    }
                }
                Selection::InlineFragment(fragment) => {
                    let type_condition = match &fragment.type_condition {
                        Some(TypeCondition::On(name)) => name.as_str(),
                        None => parent_type,
                    };

                    if self.check_type_condition(type_condition, fragment.position) {
                        self.visit(type_condition, &fragment.selection_set, is_root && type_condition == parent_type);
                    }
                }
                Selection::FragmentSpread(spread) => {
                    // Unknown fragments are reported by their own rule.
                    let Some(fragment) = self.fragments.get(spread.fragment_name.as_str()).copied() else {
                        continue;
                    };

                    let TypeCondition::On(type_condition) = &fragment.type_condition;

                    if !self.visited_fragments.insert((fragment.name.as_str(), parent_type)) {
                        continue;
                    }

                    if self.check_type_condition(type_condition, fragment.position) {
                        self.visit(type_condition, &fragment.selection_set, false);
                    }
                }
            }
        }
    }

    fn check_type_condition(&mut self, name: &str, pos: Pos) -> bool {
        match self.schema.get_type(name) {
            Some(ty) if ty.kind.is_composite() => true,
            Some(_) => {
                self.errors.push(validation_error(
                    format!("Fragment cannot condition on non composite type \"{name}\"."),
                    pos,
                ));
                false
            }
            None => {
                self.errors
                    .push(validation_error(format!("Unknown type \"{name}\"."), pos));
                false
            }
        }
    }
}
