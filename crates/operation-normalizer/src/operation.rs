use std::collections::HashSet;

use graphql_parser::query::{OperationDefinition, VariableDefinition};

use super::{directives, selection_set, value};

pub(super) fn name<'a>(operation: &OperationDefinition<'a, &'a str>) -> Option<&'a str> {
    match operation {
        OperationDefinition::SelectionSet(_) => None,
        OperationDefinition::Query(query) => query.name,
        OperationDefinition::Mutation(mutation) => mutation.name,
        OperationDefinition::Subscription(subscription) => subscription.name,
    }
}

pub(super) fn normalize<'a>(operation: &mut OperationDefinition<'a, &'a str>, used_fragments: &mut HashSet<&'a str>) {
    match operation {
        OperationDefinition::SelectionSet(selection_set) => {
            selection_set::normalize(selection_set, used_fragments);
        }
        OperationDefinition::Query(query) => {
            variables(&mut query.variable_definitions);
            directives::normalize(&mut query.directives);
            selection_set::normalize(&mut query.selection_set, used_fragments);
        }
        OperationDefinition::Mutation(mutation) => {
            variables(&mut mutation.variable_definitions);
            directives::normalize(&mut mutation.directives);
            selection_set::normalize(&mut mutation.selection_set, used_fragments);
        }
        OperationDefinition::Subscription(subscription) => {
            variables(&mut subscription.variable_definitions);
            directives::normalize(&mut subscription.directives);
            selection_set::normalize(&mut subscription.selection_set, used_fragments);
        }
    }
}

fn variables<'a>(definitions: &mut [VariableDefinition<'a, &'a str>]) {
    definitions.sort_by(|a, b| a.name.cmp(b.name));

    for definition in definitions {
        if let Some(default_value) = &mut definition.default_value {
            value::hide(default_value);
        }
    }
}
