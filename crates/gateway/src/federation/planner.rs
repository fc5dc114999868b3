//! Query planning.
//!
//! An operation is split by root field: every root field goes to the service
//! that owns it, and each involved service receives one operation holding
//! only its own root selections, the variables those selections use, and the
//! fragment definitions they reference. Fragments spread directly on the
//! root type are flattened first, with their `@skip`/`@include` conditions
//! pushed down onto the fields they contain.

use crate::federation::composition::{OperationKind, Supergraph};
use crate::federation::request::GraphQlRequest;
use apollo_compiler::{ast, Node};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// The document cannot be executed against the supergraph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

/// A root field fetched from a subgraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedField {
    pub response_key: String,
    pub field_name: String,
    pub return_type: String,
}

/// One request to one subgraph.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetch {
    /// Index into the supergraph's service list.
    pub service: usize,

    /// The operation sent to the service.
    pub request: GraphQlRequest,

    /// Root fields this fetch resolves, by response key.
    pub fields: Vec<PlannedField>,
}

/// Where a top-level response key gets its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedKey {
    /// `__typename` answered by the gateway with the root type name.
    Typename { response_key: String },

    /// Taken from the data of `fetches[fetch]`.
    Fetched { response_key: String, fetch: usize },
}

/// Everything needed to execute one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub kind: OperationKind,

    /// Fetches in execution order. Query fetches may run concurrently;
    /// mutation fetches must run one after another.
    pub fetches: Vec<Fetch>,

    /// Response keys in selection order.
    pub keys: Vec<PlannedKey>,
}

impl QueryPlan {
    /// Name of the root type the operation selects from.
    pub fn root_type_name(&self) -> &'static str {
        self.kind.root_type_name()
    }
}

type Fragments<'a> = HashMap<&'a str, &'a Node<ast::FragmentDefinition>>;

/// Which part of the plan produced a response key.
#[derive(Clone, Copy, PartialEq, Eq)]
enum KeySource {
    Typename,
    Fetch(usize),
}

/// Plan `document` against `supergraph`.
///
/// # Errors
///
/// Returns a `ValidationError` when no single operation can be selected, the
/// operation is a subscription, or a root selection cannot be resolved.
pub fn plan(
    supergraph: &Supergraph,
    document: &ast::Document,
    operation_name: Option<&str>,
    variables: &Map<String, Value>,
) -> Result<QueryPlan, ValidationError> {
    let (operations, fragments) = split_definitions(document)?;
    let operation = select_operation(&operations, operation_name)?;

    let kind = match operation.operation_type {
        ast::OperationType::Query => OperationKind::Query,
        ast::OperationType::Mutation => OperationKind::Mutation,
        ast::OperationType::Subscription => {
            return Err(ValidationError(
                "Subscriptions are not supported by this gateway.".to_string(),
            ))
        }
    };
    let root_type = kind.root_type_name();

    let mut root_fields = Vec::new();
    collect_root_fields(
        &operation.selection_set,
        root_type,
        &fragments,
        &[],
        &mut Vec::new(),
        &mut root_fields,
    )?;

    let mut keys = Vec::new();
    let mut key_sources: HashMap<String, KeySource> = HashMap::new();
    let mut groups: Vec<FetchGroup> = Vec::new();

    for field in root_fields {
        let response_key = response_key(&field).to_string();
        let field_name = field.name.as_str();

        let source = match field_name {
            "__typename" => {
                if !is_included(&field.directives, variables, &operation.variables) {
                    continue;
                }
                KeySource::Typename
            }
            "__schema" | "__type" => {
                return Err(ValidationError(
                    "Introspection is not supported by this gateway.".to_string(),
                ))
            }
            _ => {
                let owner = supergraph.root_field(kind, field_name).ok_or_else(|| {
                    ValidationError(format!(
                        "Cannot query field \"{field_name}\" on type \"{root_type}\"."
                    ))
                })?;
                let index = group_for(&mut groups, kind, owner.service);
                let Some(group) = groups.get_mut(index) else {
                    continue;
                };
                if !group.fields.iter().any(|f| f.response_key == response_key) {
                    group.fields.push(PlannedField {
                        response_key: response_key.clone(),
                        field_name: field_name.to_string(),
                        return_type: owner.return_type.clone(),
                    });
                }
                group.selections.push(ast::Selection::Field(field.clone()));
                KeySource::Fetch(index)
            }
        };

        match key_sources.get(&response_key) {
            Some(existing) if *existing == source => {}
            Some(_) => {
                return Err(ValidationError(format!(
                    "Fields \"{response_key}\" conflict because they are resolved by different services. Use different aliases on the fields to fetch both if this was intentional."
                )))
            }
            None => {
                key_sources.insert(response_key.clone(), source);
                keys.push(match source {
                    KeySource::Typename => PlannedKey::Typename { response_key },
                    KeySource::Fetch(fetch) => PlannedKey::Fetched {
                        response_key,
                        fetch,
                    },
                });
            }
        }
    }

    let fetches = groups
        .into_iter()
        .map(|group| build_fetch(operation, &fragments, group, variables))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(QueryPlan {
        kind,
        fetches,
        keys,
    })
}

/// Root selections destined for one service.
struct FetchGroup {
    service: usize,
    selections: Vec<ast::Selection>,
    fields: Vec<PlannedField>,
}

/// Index of the group that receives a field owned by `service`.
///
/// Query fields share one group per service. Mutation fields only join the
/// previous group when it targets the same service, so groups preserve the
/// document's serial order.
fn group_for(groups: &mut Vec<FetchGroup>, kind: OperationKind, service: usize) -> usize {
    let existing = match kind {
        OperationKind::Query => groups.iter().position(|g| g.service == service),
        OperationKind::Mutation => groups
            .last()
            .filter(|g| g.service == service)
            .map(|_| groups.len() - 1),
    };

    existing.unwrap_or_else(|| {
        groups.push(FetchGroup {
            service,
            selections: Vec::new(),
            fields: Vec::new(),
        });
        groups.len() - 1
    })
}

fn split_definitions(
    document: &ast::Document,
) -> Result<(Vec<&Node<ast::OperationDefinition>>, Fragments<'_>), ValidationError> {
    let mut operations = Vec::new();
    let mut fragments: Fragments<'_> = HashMap::new();

    for definition in &document.definitions {
        match definition {
            ast::Definition::OperationDefinition(operation) => operations.push(operation),
            ast::Definition::FragmentDefinition(fragment) => {
                let name = fragment.name.as_str();
                if fragments.insert(name, fragment).is_some() {
                    return Err(ValidationError(format!(
                        "There can be only one fragment named \"{name}\"."
                    )));
                }
            }
            _ => {
                return Err(ValidationError(
                    "Type system definitions are not executable.".to_string(),
                ))
            }
        }
    }

    Ok((operations, fragments))
}

fn select_operation<'a>(
    operations: &[&'a Node<ast::OperationDefinition>],
    operation_name: Option<&str>,
) -> Result<&'a Node<ast::OperationDefinition>, ValidationError> {
    match operation_name {
        Some(name) => operations
            .iter()
            .find(|op| op.name.as_ref().is_some_and(|n| n.as_str() == name))
            .copied()
            .ok_or_else(|| ValidationError(format!("Unknown operation named \"{name}\"."))),
        None => match operations {
            [only] => Ok(*only),
            [] => Err(ValidationError("Must provide an operation.".to_string())),
            _ => Err(ValidationError(
                "Must provide operation name if query contains multiple operations.".to_string(),
            )),
        },
    }
}

/// Flatten root-level fragments into a list of root fields.
fn collect_root_fields(
    selections: &[ast::Selection],
    root_type: &str,
    fragments: &Fragments<'_>,
    inherited: &[Node<ast::Directive>],
    spread_stack: &mut Vec<String>,
    out: &mut Vec<Node<ast::Field>>,
) -> Result<(), ValidationError> {
    for selection in selections {
        match selection {
            ast::Selection::Field(field) => {
                if inherited.is_empty() {
                    out.push(field.clone());
                } else {
                    let mut field = (**field).clone();
                    field.directives.0.extend(inherited.iter().cloned());
                    out.push(Node::new(field));
                }
            }
            ast::Selection::FragmentSpread(spread) => {
                let name = spread.fragment_name.as_str();
                let fragment = fragments.get(name).ok_or_else(|| {
                    ValidationError(format!("Unknown fragment \"{name}\"."))
                })?;
                let condition = fragment.type_condition.as_str();
                if condition != root_type {
                    return Err(ValidationError(format!(
                        "Fragment \"{name}\" cannot be spread here as objects of type \"{root_type}\" can never be of type \"{condition}\"."
                    )));
                }
                if spread_stack.iter().any(|s| s == name) {
                    return Err(ValidationError(format!(
                        "Cannot spread fragment \"{name}\" within itself."
                    )));
                }

                let directives = with_inherited(inherited, &spread.directives);
                spread_stack.push(name.to_string());
                collect_root_fields(
                    &fragment.selection_set,
                    root_type,
                    fragments,
                    &directives,
                    spread_stack,
                    out,
                )?;
                spread_stack.pop();
            }
            ast::Selection::InlineFragment(inline) => {
                if let Some(condition) = &inline.type_condition {
                    if condition.as_str() != root_type {
                        return Err(ValidationError(format!(
                            "Fragment cannot be spread here as objects of type \"{root_type}\" can never be of type \"{condition}\"."
                        )));
                    }
                }
                let directives = with_inherited(inherited, &inline.directives);
                collect_root_fields(
                    &inline.selection_set,
                    root_type,
                    fragments,
                    &directives,
                    spread_stack,
                    out,
                )?;
            }
        }
    }
    Ok(())
}

fn with_inherited(
    inherited: &[Node<ast::Directive>],
    own: &ast::DirectiveList,
) -> Vec<Node<ast::Directive>> {
    inherited.iter().chain(own.iter()).cloned().collect()
}

fn response_key(field: &ast::Field) -> &str {
    field.alias.as_ref().unwrap_or(&field.name).as_str()
}

/// Evaluate `@skip`/`@include` against the request variables, falling back
/// to the operation's variable defaults.
fn is_included(
    directives: &ast::DirectiveList,
    variables: &Map<String, Value>,
    definitions: &[Node<ast::VariableDefinition>],
) -> bool {
    let variable_flag = |name: &str| {
        variables.get(name).and_then(Value::as_bool).or_else(|| {
            definitions
                .iter()
                .find(|definition| definition.name.as_str() == name)
                .and_then(|definition| definition.default_value.as_deref())
                .and_then(|value| match value {
                    ast::Value::Boolean(flag) => Some(*flag),
                    _ => None,
                })
        })
    };

    directives.iter().all(|directive| {
        let condition = directive
            .arguments
            .iter()
            .find(|argument| argument.name.as_str() == "if")
            .is_some_and(|argument| match &*argument.value {
                ast::Value::Boolean(value) => *value,
                ast::Value::Variable(name) => variable_flag(name.as_str()).unwrap_or(false),
                _ => false,
            });
        match directive.name.as_str() {
            "skip" => !condition,
            "include" => condition,
            _ => true,
        }
    })
}

fn build_fetch(
    operation: &Node<ast::OperationDefinition>,
    fragments: &Fragments<'_>,
    group: FetchGroup,
    variables: &Map<String, Value>,
) -> Result<Fetch, ValidationError> {
    let mut fragment_names = Vec::new();
    collect_fragment_names(&group.selections, fragments, &mut fragment_names)?;

    let mut used = HashSet::new();
    variables_in_selections(&group.selections, &mut used);
    variables_in_directives(&operation.directives, &mut used);
    for name in &fragment_names {
        if let Some(fragment) = fragments.get(name.as_str()) {
            variables_in_directives(&fragment.directives, &mut used);
            variables_in_selections(&fragment.selection_set, &mut used);
        }
    }

    let mut undefined: Vec<&String> = used
        .iter()
        .filter(|name| {
            !operation
                .variables
                .iter()
                .any(|definition| definition.name.as_str() == name.as_str())
        })
        .collect();
    undefined.sort();
    if let Some(name) = undefined.first() {
        return Err(ValidationError(format!("Variable \"${name}\" is not defined.")));
    }

    let mut subgraph_operation = (**operation).clone();
    subgraph_operation
        .variables
        .retain(|definition| used.contains(definition.name.as_str()));
    subgraph_operation.selection_set = group.selections;

    let mut document = ast::Document::new();
    document
        .definitions
        .push(ast::Definition::OperationDefinition(Node::new(
            subgraph_operation,
        )));
    for name in &fragment_names {
        if let Some(fragment) = fragments.get(name.as_str()) {
            document
                .definitions
                .push(ast::Definition::FragmentDefinition((*fragment).clone()));
        }
    }

    let forwarded: Map<String, Value> = variables
        .iter()
        .filter(|(name, _)| used.contains(name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    Ok(Fetch {
        service: group.service,
        request: GraphQlRequest {
            query: document.to_string(),
            operation_name: operation.name.as_ref().map(ToString::to_string),
            variables: forwarded,
            extensions: Map::new(),
        },
        fields: group.fields,
    })
}

/// Names of fragments referenced from `selections`, transitively, in first-use order.
fn collect_fragment_names(
    selections: &[ast::Selection],
    fragments: &Fragments<'_>,
    out: &mut Vec<String>,
) -> Result<(), ValidationError> {
    for selection in selections {
        match selection {
            ast::Selection::Field(field) => {
                collect_fragment_names(&field.selection_set, fragments, out)?;
            }
            ast::Selection::InlineFragment(inline) => {
                collect_fragment_names(&inline.selection_set, fragments, out)?;
            }
            ast::Selection::FragmentSpread(spread) => {
                let name = spread.fragment_name.as_str();
                if out.iter().any(|n| n == name) {
                    continue;
                }
                let fragment = fragments.get(name).ok_or_else(|| {
                    ValidationError(format!("Unknown fragment \"{name}\"."))
                })?;
                out.push(name.to_string());
                collect_fragment_names(&fragment.selection_set, fragments, out)?;
            }
        }
    }
    Ok(())
}

fn variables_in_selections(selections: &[ast::Selection], used: &mut HashSet<String>) {
    for selection in selections {
        match selection {
            ast::Selection::Field(field) => {
                for argument in &field.arguments {
                    variables_in_value(&argument.value, used);
                }
                variables_in_directives(&field.directives, used);
                variables_in_selections(&field.selection_set, used);
            }
            ast::Selection::FragmentSpread(spread) => {
                variables_in_directives(&spread.directives, used);
            }
            ast::Selection::InlineFragment(inline) => {
                variables_in_directives(&inline.directives, used);
                variables_in_selections(&inline.selection_set, used);
            }
        }
    }
}

fn variables_in_directives(directives: &ast::DirectiveList, used: &mut HashSet<String>) {
    for directive in directives.iter() {
        for argument in &directive.arguments {
            variables_in_value(&argument.value, used);
        }
    }
}

fn variables_in_value(value: &ast::Value, used: &mut HashSet<String>) {
    match value {
        ast::Value::Variable(name) => {
            used.insert(name.to_string());
        }
        ast::Value::List(items) => {
            for item in items {
                variables_in_value(item, used);
            }
        }
        ast::Value::Object(fields) => {
            for (_, item) in fields {
                variables_in_value(item, used);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::federation::document;
    use crate::federation::ServiceDefinition;
    use serde_json::json;

    fn supergraph() -> Supergraph {
        let sdls = [
            "type Query { me: User user(id: ID!): User } type Mutation { login(name: String!): String } type User { id: ID! name: String }",
            "type Query { topProducts(first: Int): [Product] } type Mutation { buy(upc: String!): Boolean } type Product { upc: String! name: String }",
            "type Query { reviews(limit: Int): [Review] } type Review { body: String }",
        ];
        let subgraphs: Vec<(ServiceDefinition, String)> = sdls
            .iter()
            .enumerate()
            .map(|(i, sdl)| {
                (
                    ServiceDefinition::new(format!("service{}", i + 1), format!("http://s{}", i + 1)),
                    sdl.to_string(),
                )
            })
            .collect();
        Supergraph::compose(&subgraphs).unwrap()
    }

    fn plan_query(query: &str, operation_name: Option<&str>, variables: Value) -> Result<QueryPlan, ValidationError> {
        let document = document::parse(query, "request.graphql").unwrap();
        let variables = variables.as_object().cloned().unwrap_or_default();
        plan(&supergraph(), &document, operation_name, &variables)
    }

    /// Root field response keys, variable names and fragment names of a subgraph query.
    fn shape(query: &str) -> (Vec<String>, Vec<String>, Vec<String>) {
        let document = document::parse(query, "subgraph.graphql").unwrap();
        let mut fields = Vec::new();
        let mut variables = Vec::new();
        let mut fragments = Vec::new();
        for definition in &document.definitions {
            match definition {
                ast::Definition::OperationDefinition(op) => {
                    variables.extend(op.variables.iter().map(|v| v.name.to_string()));
                    for selection in &op.selection_set {
                        if let ast::Selection::Field(field) = selection {
                            fields.push(response_key(field).to_string());
                        }
                    }
                }
                ast::Definition::FragmentDefinition(fragment) => {
                    fragments.push(fragment.name.to_string());
                }
                _ => {}
            }
        }
        (fields, variables, fragments)
    }

    fn keys(plan: &QueryPlan) -> Vec<&str> {
        plan.keys
            .iter()
            .map(|k| match k {
                PlannedKey::Typename { response_key } => response_key.as_str(),
                PlannedKey::Fetched { response_key, .. } => response_key.as_str(),
            })
            .collect()
    }

    #[test]
    fn test_single_service_query_is_one_fetch() {
        let plan = plan_query("{ me { id name } }", None, json!({})).unwrap();

        assert_eq!(plan.kind, OperationKind::Query);
        assert_eq!(plan.fetches.len(), 1);
        let fetch = &plan.fetches[0];
        assert_eq!(fetch.service, 0);
        assert_eq!(shape(&fetch.request.query).0, vec!["me"]);
        assert_eq!(fetch.fields[0].return_type, "User");
    }

    #[test]
    fn test_cross_service_query_splits_by_owner() {
        let plan = plan_query(
            "query Home { reviews { body } me { name } products: topProducts { upc } }",
            None,
            json!({}),
        )
        .unwrap();

        assert_eq!(plan.fetches.len(), 3);
        assert_eq!(
            plan.fetches.iter().map(|f| f.service).collect::<Vec<_>>(),
            vec![2, 0, 1]
        );
        assert_eq!(keys(&plan), vec!["reviews", "me", "products"]);
        assert_eq!(shape(&plan.fetches[2].request.query).0, vec!["products"]);
        assert!(plan
            .fetches
            .iter()
            .all(|f| f.request.operation_name.as_deref() == Some("Home")));
    }

    #[test]
    fn test_only_used_variables_are_forwarded() {
        let plan = plan_query(
            "query Q($id: ID!, $first: Int, $limit: Int) { user(id: $id) { name } topProducts(first: $first) { upc } }",
            Some("Q"),
            json!({ "id": "7", "first": 3, "limit": 10 }),
        )
        .unwrap();

        let users = &plan.fetches[0];
        assert_eq!(users.request.variables, json!({ "id": "7" }).as_object().cloned().unwrap());
        assert_eq!(shape(&users.request.query).1, vec!["id"]);

        let products = &plan.fetches[1];
        assert_eq!(products.request.variables, json!({ "first": 3 }).as_object().cloned().unwrap());
        assert_eq!(shape(&products.request.query).1, vec!["first"]);
    }

    #[test]
    fn test_root_fragments_are_flattened_and_nested_fragments_kept() {
        let plan = plan_query(
            "query { ...Root } fragment Root on Query { me { ...UserFields } topProducts { upc } } fragment UserFields on User { id name } fragment Unused on Product { name }",
            None,
            json!({}),
        )
        .unwrap();

        assert_eq!(plan.fetches.len(), 2);
        let (fields, _, fragments) = shape(&plan.fetches[0].request.query);
        assert_eq!(fields, vec!["me"]);
        assert_eq!(fragments, vec!["UserFields"]);

        let (fields, _, fragments) = shape(&plan.fetches[1].request.query);
        assert_eq!(fields, vec!["topProducts"]);
        assert!(fragments.is_empty());
    }

    #[test]
    fn test_fragment_conditions_are_pushed_onto_fields() {
        let plan = plan_query(
            "query Q($withMe: Boolean!) { ... on Query @include(if: $withMe) { me { id } } reviews { body } }",
            Some("Q"),
            json!({ "withMe": false }),
        )
        .unwrap();

        let me_fetch = &plan.fetches[0];
        assert!(me_fetch.request.query.contains("@include(if: $withMe)"));
        assert_eq!(me_fetch.request.variables.get("withMe"), Some(&json!(false)));
        assert!(plan.fetches[1].request.variables.is_empty());
    }

    #[test]
    fn test_typename_is_answered_locally() {
        let plan = plan_query("{ __typename kind: __typename me { id } }", None, json!({})).unwrap();

        assert_eq!(plan.fetches.len(), 1);
        assert_eq!(keys(&plan), vec!["__typename", "kind", "me"]);
        assert!(matches!(&plan.keys[0], PlannedKey::Typename { .. }));

        let only_typename = plan_query("{ __typename }", None, json!({})).unwrap();
        assert!(only_typename.fetches.is_empty());
    }

    #[test]
    fn test_skipped_typename_is_omitted() {
        let plan = plan_query(
            "query Q($skip: Boolean!) { __typename @skip(if: $skip) me { id } }",
            None,
            json!({ "skip": true }),
        )
        .unwrap();

        assert_eq!(keys(&plan), vec!["me"]);
    }

    #[test]
    fn test_typename_directives_use_variable_defaults() {
        let plan = plan_query(
            "query Q($hide: Boolean = true) { __typename @skip(if: $hide) me { id } }",
            None,
            json!({}),
        )
        .unwrap();
        assert_eq!(keys(&plan), vec!["me"]);

        let plan = plan_query(
            "query Q($show: Boolean = true) { __typename @include(if: $show) me { id } }",
            None,
            json!({}),
        )
        .unwrap();
        assert_eq!(keys(&plan), vec!["__typename", "me"]);

        // Supplied values win over defaults
        let plan = plan_query(
            "query Q($hide: Boolean = true) { __typename @skip(if: $hide) me { id } }",
            None,
            json!({ "hide": false }),
        )
        .unwrap();
        assert_eq!(keys(&plan), vec!["__typename", "me"]);
    }

    #[test]
    fn test_mutations_keep_serial_order() {
        let plan = plan_query(
            "mutation { a: login(name: \"x\") buy(upc: \"1\") b: login(name: \"y\") }",
            None,
            json!({}),
        )
        .unwrap();

        assert_eq!(plan.kind, OperationKind::Mutation);
        assert_eq!(
            plan.fetches.iter().map(|f| f.service).collect::<Vec<_>>(),
            vec![0, 1, 0]
        );
        assert_eq!(plan.root_type_name(), "Mutation");
    }

    #[test]
    fn test_same_service_mutations_share_a_fetch() {
        let plan = plan_query(
            "mutation { a: login(name: \"x\") b: login(name: \"y\") }",
            None,
            json!({}),
        )
        .unwrap();

        assert_eq!(plan.fetches.len(), 1);
        assert_eq!(shape(&plan.fetches[0].request.query).0, vec!["a", "b"]);
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            ("{ nope }", None, "Cannot query field \"nope\" on type \"Query\"."),
            ("{ __schema { types { name } } }", None, "Introspection is not supported"),
            ("subscription { me { id } }", None, "Subscriptions are not supported"),
            ("query A { me { id } } query B { reviews { body } }", None, "Must provide operation name"),
            ("query A { me { id } }", Some("B"), "Unknown operation named \"B\"."),
            ("{ ...Missing }", None, "Unknown fragment \"Missing\"."),
            ("{ ...P } fragment P on Product { upc }", None, "can never be of type \"Product\""),
            ("{ ...A } fragment A on Query { ...A }", None, "Cannot spread fragment \"A\" within itself."),
            ("{ me { id } } type Extra { a: Int }", None, "not executable"),
            ("{ x: me { id } x: reviews { body } }", None, "Fields \"x\" conflict"),
            ("{ user(id: $id) { name } }", None, "Variable \"$id\" is not defined."),
            ("fragment A on Query { me { id } } fragment A on Query { me { name } } { ...A }", None, "only one fragment named \"A\""),
        ];

        for (query, operation_name, expected) in cases {
            let error = plan_query(query, operation_name, json!({})).unwrap_err();
            assert!(
                error.0.contains(expected),
                "{query}: expected {expected:?}, got {:?}",
                error.0
            );
        }
    }

    #[test]
    fn test_is_included() {
        let variables = json!({ "yes": true, "no": false }).as_object().cloned().unwrap();
        let document =
            document::parse("{ a @skip(if: true) b @include(if: $yes) c @include(if: $no) d @skip(if: $missing) }", "t.graphql")
                .unwrap();
        let ast::Definition::OperationDefinition(op) = &document.definitions[0] else {
            unreachable!("operation expected");
        };

        let included: Vec<bool> = op
            .selection_set
            .iter()
            .filter_map(|s| match s {
                ast::Selection::Field(f) => Some(is_included(&f.directives, &variables, &op.variables)),
                _ => None,
            })
            .collect();
        assert_eq!(included, vec![false, true, false, true]);
    }
}
