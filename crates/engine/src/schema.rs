//! Minimal schema model: the types, their fields and their `@cacheControl` annotations.

use graphql_parser::schema::{self as ast, Definition, TypeDefinition as AstTypeDefinition};
use indexmap::IndexMap;
use sha2::{Digest, Sha256};

use crate::cache_control::CacheScope;

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("could not parse the schema: {0}")]
    Parse(#[from] ast::ParseError),
    #[error("invalid @cacheControl on {location}: {message}")]
    InvalidCacheControl { location: String, message: String },
    #[error("the schema does not define a query root type")]
    MissingQueryType,
    #[error("type {0} is defined more than once")]
    DuplicateType(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
}

impl TypeKind {
    pub fn is_composite(self) -> bool {
        matches!(self, TypeKind::Object | TypeKind::Interface | TypeKind::Union)
    }
}

/// `@cacheControl(maxAge: Int, scope: CacheControlScope, inheritMaxAge: Boolean)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheControlAnnotation {
    pub max_age: Option<u32>,
    pub scope: Option<CacheScope>,
    pub inherit_max_age: bool,
}

/// Reference to a type as written in a field definition, `[Droid!]!` for example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub named: String,
    pub display: String,
}

#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub name: String,
    pub ty: TypeRef,
    pub cache_control: Option<CacheControlAnnotation>,
}

#[derive(Debug, Clone)]
pub struct TypeDefinition {
    pub name: String,
    pub kind: TypeKind,
    pub fields: IndexMap<String, FieldDefinition>,
    pub cache_control: Option<CacheControlAnnotation>,
}

#[derive(Debug)]
pub struct Schema {
    types: IndexMap<String, TypeDefinition>,
    query_type: String,
    mutation_type: Option<String>,
    subscription_type: Option<String>,
    printed: String,
}

impl Schema {
    pub fn from_sdl(sdl: &str) -> Result<Schema, SchemaError> {
        let document = graphql_parser::parse_schema::<String>(sdl)?;

        let mut types = IndexMap::new();
        let mut roots = (None, None, None);

        for definition in &document.definitions {
            match definition {
                Definition::SchemaDefinition(schema) => {
                    roots = (
                        schema.query.clone(),
                        schema.mutation.clone(),
                        schema.subscription.clone(),
                    );
                }
                Definition::TypeDefinition(definition) => {
                    let definition = convert_type(definition)?;
                    if types.contains_key(&definition.name) {
                        return Err(SchemaError::DuplicateType(definition.name));
                    }
                    types.insert(definition.name.clone(), definition);
                }
                Definition::TypeExtension(_) | Definition::DirectiveDefinition(_) => {}
            }
        }

        let default_root = |name: &str| types.contains_key(name).then(|| name.to_string());

        let query_type = roots
            .0
            .or_else(|| default_root("Query"))
            .ok_or(SchemaError::MissingQueryType)?;
        let mutation_type = roots.1.or_else(|| default_root("Mutation"));
        let subscription_type = roots.2.or_else(|| default_root("Subscription"));

        Ok(Schema {
            types,
            query_type,
            mutation_type,
            subscription_type,
            printed: document.to_string(),
        })
    }

    pub fn get_type(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    pub fn field(&self, parent_type: &str, field_name: &str) -> Option<&FieldDefinition> {
        self.types.get(parent_type)?.fields.get(field_name)
    }

    pub fn query_type(&self) -> &str {
        &self.query_type
    }

    pub fn mutation_type(&self) -> Option<&str> {
        self.mutation_type.as_deref()
    }

    pub fn subscription_type(&self) -> Option<&str> {
        self.subscription_type.as_deref()
    }

    /// The schema printed back from its parsed form, independent of the input formatting.
    pub fn printed(&self) -> &str {
        &self.printed
    }

    /// Hex encoded SHA-256 of the printed schema.
    pub fn executable_schema_id(&self) -> String {
        hex::encode(Sha256::digest(self.printed.as_bytes()))
    }
}

fn convert_type(definition: &AstTypeDefinition<'_, String>) -> Result<TypeDefinition, SchemaError> {
    let (name, kind, fields, directives) = match definition {
        AstTypeDefinition::Scalar(scalar) => (&scalar.name, TypeKind::Scalar, None, &scalar.directives),
        AstTypeDefinition::Object(object) => (&object.name, TypeKind::Object, Some(&object.fields), &object.directives),
        AstTypeDefinition::Interface(interface) => (
            &interface.name,
            TypeKind::Interface,
            Some(&interface.fields),
            &interface.directives,
        ),
        AstTypeDefinition::Union(union) => (&union.name, TypeKind::Union, None, &union.directives),
        AstTypeDefinition::Enum(enum_type) => (&enum_type.name, TypeKind::Enum, None, &enum_type.directives),
        AstTypeDefinition::InputObject(input) => (&input.name, TypeKind::InputObject, None, &input.directives),
    };

    let fields = fields
        .into_iter()
        .flatten()
        .map(|field| {
            let location = format!("{name}.{}", field.name);
            let definition = FieldDefinition {
                name: field.name.clone(),
                ty: TypeRef {
                    named: named_type(&field.field_type).to_string(),
                    display: field.field_type.to_string(),
                },
                cache_control: cache_control_annotation(&field.directives, &location)?,
            };
            Ok((field.name.clone(), definition))
        })
        .collect::<Result<IndexMap<_, _>, SchemaError>>()?;

    Ok(TypeDefinition {
        name: name.clone(),
        kind,
        fields,
        cache_control: cache_control_annotation(directives, name)?,
    })
}

fn named_type<'a>(ty: &'a ast::Type<'_, String>) -> &'a str {
    match ty {
        ast::Type::NamedType(name) => name,
        ast::Type::ListType(inner) | ast::Type::NonNullType(inner) => named_type(inner),
    }
}

fn cache_control_annotation(
    directives: &[ast::Directive<'_, String>],
    location: &str,
) -> Result<Option<CacheControlAnnotation>, SchemaError> {
    let Some(directive) = directives.iter().find(|directive| directive.name == "cacheControl") else {
        return Ok(None);
    };

    let invalid = |message: String| SchemaError::InvalidCacheControl {
        location: location.to_string(),
        message,
    };

    let mut annotation = CacheControlAnnotation::default();

    for (name, value) in &directive.arguments {
        match (name.as_str(), value) {
            ("maxAge", ast::Value::Int(max_age)) => {
                let max_age = max_age
                    .as_i64()
                    .and_then(|max_age| u32::try_from(max_age).ok())
                    .ok_or_else(|| invalid(format!("maxAge must be a non-negative integer, got {max_age:?}")))?;
                annotation.max_age = Some(max_age);
            }
            ("scope", ast::Value::Enum(scope)) => {
                annotation.scope = Some(match scope.as_str() {
                    "PUBLIC" => CacheScope::Public,
                    "PRIVATE" => CacheScope::Private,
                    other => return Err(invalid(format!("unknown scope {other}"))),
                });
            }
            ("inheritMaxAge", ast::Value::Boolean(inherit)) => {
                annotation.inherit_max_age = *inherit;
            }
            (name, value) => return Err(invalid(format!("unexpected argument {name}: {value:?}"))),
        }
    }

    Ok(Some(annotation))
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    const SDL: &str = indoc! {r#"
        enum CacheControlScope { PUBLIC PRIVATE }
        directive @cacheControl(maxAge: Int, scope: CacheControlScope, inheritMaxAge: Boolean) on FIELD_DEFINITION | OBJECT | INTERFACE | UNION

        type Query {
          droid(id: ID!): Droid
          me: User @cacheControl(maxAge: 5, scope: PRIVATE)
        }

        type Droid @cacheControl(maxAge: 60) {
          name: String!
          friends: [Droid!]! @cacheControl(inheritMaxAge: true)
        }

        type User {
          name: String
        }
    "#};

    #[test]
    fn reads_annotations() {
        let schema = Schema::from_sdl(SDL).unwrap();

        assert_eq!(schema.query_type(), "Query");
        assert_eq!(schema.mutation_type(), None);

        let droid = schema.get_type("Droid").unwrap();
        assert_eq!(droid.kind, TypeKind::Object);
        assert_eq!(
            droid.cache_control,
            Some(CacheControlAnnotation {
                max_age: Some(60),
                ..Default::default()
            })
        );

        let friends = schema.field("Droid", "friends").unwrap();
        assert_eq!(friends.ty.named, "Droid");
        assert_eq!(friends.ty.display, "[Droid!]!");
        assert!(friends.cache_control.unwrap().inherit_max_age);

        let me = schema.field("Query", "me").unwrap().cache_control.unwrap();
        assert_eq!(me.max_age, Some(5));
        assert_eq!(me.scope, Some(CacheScope::Private));
    }

    #[test]
    fn schema_id_ignores_formatting() {
        let a = Schema::from_sdl("type Query { a: String }").unwrap();
        let b = Schema::from_sdl("type Query {\n\n  a: String\n}\n").unwrap();
        let c = Schema::from_sdl("type Query { b: String }").unwrap();

        assert_eq!(a.executable_schema_id(), b.executable_schema_id());
        assert_ne!(a.executable_schema_id(), c.executable_schema_id());
        assert_eq!(a.executable_schema_id().len(), 64);
    }

    #[test]
    fn explicit_root_types() {
        let schema = Schema::from_sdl(indoc! {r#"
            schema { query: Root mutation: Change }
            type Root { a: String }
            type Change { b: String }
        "#})
        .unwrap();

        assert_eq!(schema.query_type(), "Root");
        assert_eq!(schema.mutation_type(), Some("Change"));
    }

    #[test]
    fn invalid_max_age() {
        let error = Schema::from_sdl("type Query { a: String @cacheControl(maxAge: -1) }").unwrap_err();
        insta::assert_snapshot!(error, @"invalid @cacheControl on Query.a: maxAge must be a non-negative integer, got Number(-1)");
    }

    #[test]
    fn missing_query_type() {
        assert!(matches!(
            Schema::from_sdl("type User { a: String }"),
            Err(SchemaError::MissingQueryType)
        ));
    }
}
