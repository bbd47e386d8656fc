use graphql_parser::query::Directive;

use super::value;

pub(super) fn normalize<'a>(directives: &mut [Directive<'a, &'a str>]) {
    directives.sort_by(|a, b| a.name.cmp(b.name));

    for directive in directives {
        value::hide_arguments(&mut directive.arguments);
    }
}
