use indoc::indoc;

use super::signature;

#[test]
fn operation_signature_example() {
    let input = indoc! {r#"
        # Operation definition needs to appear after all fragment definitions
        query GetUser {
          user(id: "hello") {
            # Replace string argument value with empty string
            ...NameParts # Spread fragment needs to appear after individual fields
            timezone # Needs to appear alphanumerically after `name`
            aliased: name # Need to remove alias
          }
        }

        # Excessive characters (including this comment!) need to be removed
        fragment NameParts on User {
          firstname
          lastname
        }
    "#};

    let output = signature(input, Some("GetUser")).unwrap();

    insta::assert_snapshot!(output, @r#"fragment NameParts on User{firstname lastname}query GetUser{user(id:""){name timezone...NameParts}}"#);
}

#[test]
fn literals_are_hidden() {
    let input = indoc! {r#"
        query GetUser {
          user(id: 69420, ratio: 1.5, tags: ["a", "b"], filter: { name: "x" }, kind: ADMIN, active: true) {
            name @include(if: false)
          }
        }
    "#};

    let output = signature(input, None).unwrap();

    insta::assert_snapshot!(output, @r#"query GetUser{user(active:true,filter:{},id:0,kind:ADMIN,ratio:0,tags:[]){name@include(if:false)}}"#);
}

#[test]
fn variables_are_kept_and_sorted() {
    let input = indoc! {r#"
        query Search($term: String = "secret", $first: Int!) {
          search(term: $term, first: $first) { id }
        }
    "#};

    let output = signature(input, Some("Search")).unwrap();

    insta::assert_snapshot!(output, @r#"query Search($first:Int!,$term:String=""){search(first:$first,term:$term){id}}"#);
}

#[test]
fn other_operations_and_unused_fragments_are_dropped() {
    let input = indoc! {r#"
        query A { a { ...OnlyB } }
        query B { b { ...Used } }

        fragment Used on Thing { ...Nested }
        fragment Nested on Thing { id }
        fragment OnlyB on Thing { name }
    "#};

    let output = signature(input, Some("B")).unwrap();

    insta::assert_snapshot!(output, @"fragment Nested on Thing{id}fragment Used on Thing{...Nested}query B{b{...Used}}");
}

#[test]
fn inline_fragments_are_sorted_after_spreads() {
    let input = indoc! {r#"
        {
          hero {
            ... on Human { height }
            ... on Droid { primaryFunction }
            ...HeroName
            id
          }
        }

        fragment HeroName on Character { name }
    "#};

    let output = signature(input, None).unwrap();

    insta::assert_snapshot!(output, @"fragment HeroName on Character{name}{hero{id...HeroName...on Droid{primaryFunction}...on Human{height}}}");
}

#[test]
fn different_spellings_share_a_signature() {
    let a = signature("query Q { b: name, age }", None).unwrap();
    let b = signature(
        indoc! {r#"
            query Q {
              age
              name
            }
        "#},
        Some("Q"),
    )
    .unwrap();

    assert_eq!(a, b);
}

#[test]
fn unknown_operation_name() {
    let error = signature("query A { a }", Some("B")).unwrap_err();
    insta::assert_snapshot!(error, @r#"no operation named "B" in the document"#);
}

#[test]
fn multiple_operations_without_name() {
    let error = signature("query A { a } query B { b }", None).unwrap_err();
    insta::assert_snapshot!(error, @"the document contains multiple operations, an operation name is required");
}

#[test]
fn invalid_document() {
    assert!(signature("query {", None).is_err());
}
