use std::{cmp::Ordering, collections::HashSet};

use graphql_parser::query::{Selection, SelectionSet, TypeCondition};

use super::{directives, value};

pub(super) fn normalize<'a>(selection_set: &mut SelectionSet<'a, &'a str>, used_fragments: &mut HashSet<&'a str>) {
    for selection in &mut selection_set.items {
        normalize_selection(selection, used_fragments);
    }

    selection_set.items.sort_by(sort_selection);
}

fn normalize_selection<'a>(selection: &mut Selection<'a, &'a str>, used_fragments: &mut HashSet<&'a str>) {
    match selection {
        Selection::Field(field) => {
            field.alias = None;

            value::hide_arguments(&mut field.arguments);
            directives::normalize(&mut field.directives);

            normalize(&mut field.selection_set, used_fragments);
        }
        Selection::FragmentSpread(fragment) => {
            directives::normalize(&mut fragment.directives);
            used_fragments.insert(fragment.fragment_name);
        }
        Selection::InlineFragment(fragment) => {
            directives::normalize(&mut fragment.directives);
            normalize(&mut fragment.selection_set, used_fragments);
        }
    }
}

fn sort_selection<'a>(a: &Selection<'a, &'a str>, b: &Selection<'a, &'a str>) -> Ordering {
    match (a, b) {
        (Selection::Field(a), Selection::Field(b)) => a.name.cmp(b.name),
        (Selection::Field(_), _) => Ordering::Less,
        (_, Selection::Field(_)) => Ordering::Greater,
        (Selection::FragmentSpread(a), Selection::FragmentSpread(b)) => a.fragment_name.cmp(b.fragment_name),
        (Selection::FragmentSpread(_), Selection::InlineFragment(_)) => Ordering::Less,
        (Selection::InlineFragment(_), Selection::FragmentSpread(_)) => Ordering::Greater,
        (Selection::InlineFragment(a), Selection::InlineFragment(b)) => match (&a.type_condition, &b.type_condition) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(TypeCondition::On(a)), Some(TypeCondition::On(b))) => a.cmp(b),
        },
    }
}
