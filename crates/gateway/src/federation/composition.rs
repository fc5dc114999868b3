//! Supergraph composition.
//!
//! Composition works at the level of root fields: every `Query` and
//! `Mutation` field is owned by exactly one subgraph. A field published by
//! several subgraphs is only accepted when all of them mark it `@shareable`,
//! and then belongs to the first one in service-list order.

use crate::federation::document;
use crate::federation::ServiceDefinition;
use apollo_compiler::ast;
use std::collections::BTreeMap;

/// Federation plumbing fields that are never exposed through the gateway.
const INTERNAL_ROOT_FIELDS: [&str; 2] = ["_service", "_entities"];

/// Root operation kinds the gateway can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Query,
    Mutation,
}

impl OperationKind {
    /// Name of the root type in the supergraph.
    pub fn root_type_name(self) -> &'static str {
        match self {
            OperationKind::Query => "Query",
            OperationKind::Mutation => "Mutation",
        }
    }
}

/// A root field and the service that resolves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootField {
    /// Index into the supergraph's service list.
    pub service: usize,

    /// Declared return type, e.g. `[Product!]!`.
    pub return_type: String,
}

/// The composed view of all subgraphs.
#[derive(Debug, Clone)]
pub struct Supergraph {
    services: Vec<ServiceDefinition>,
    sdls: Vec<String>,
    query_fields: BTreeMap<String, RootField>,
    mutation_fields: BTreeMap<String, RootField>,
}

/// Root field as published by one subgraph, before conflicts are resolved.
struct Candidate {
    service: usize,
    return_type: String,
    shareable: bool,
}

impl Supergraph {
    /// Compose the supergraph from `(service, sdl)` pairs in service-list order.
    ///
    /// # Errors
    ///
    /// Returns every composition problem found: SDL syntax errors, conflicting
    /// root fields, or a supergraph without query fields.
    pub fn compose(subgraphs: &[(ServiceDefinition, String)]) -> Result<Self, Vec<String>> {
        let mut errors = Vec::new();
        let mut query: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();
        let mut mutation: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();

        for (index, (service, sdl)) in subgraphs.iter().enumerate() {
            let parsed = match document::parse(sdl, &format!("{}.graphql", service.name)) {
                Ok(parsed) => parsed,
                Err(syntax_errors) => {
                    errors.extend(syntax_errors.into_iter().map(|e| {
                        format!(
                            "[{}] {} ({}:{})",
                            service.name, e.message, e.location.line, e.location.column
                        )
                    }));
                    continue;
                }
            };

            let roots = RootTypeNames::of(&parsed);
            for (kind, fields) in [
                (OperationKind::Query, &mut query),
                (OperationKind::Mutation, &mut mutation),
            ] {
                for (name, candidate) in root_fields_of(&parsed, roots.name_for(kind), index) {
                    fields.entry(name).or_default().push(candidate);
                }
            }
        }

        let query_fields = resolve_owners(OperationKind::Query, query, subgraphs, &mut errors);
        let mutation_fields =
            resolve_owners(OperationKind::Mutation, mutation, subgraphs, &mut errors);

        if errors.is_empty() && query_fields.is_empty() {
            errors.push("No subgraph defines any Query root field".to_string());
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self {
            services: subgraphs.iter().map(|(s, _)| s.clone()).collect(),
            sdls: subgraphs.iter().map(|(_, sdl)| sdl.clone()).collect(),
            query_fields,
            mutation_fields,
        })
    }

    /// Look up the owner of a root field.
    pub fn root_field(&self, kind: OperationKind, name: &str) -> Option<&RootField> {
        self.fields(kind).get(name)
    }

    /// All root fields of one operation kind, sorted by name.
    pub fn fields(&self, kind: OperationKind) -> &BTreeMap<String, RootField> {
        match kind {
            OperationKind::Query => &self.query_fields,
            OperationKind::Mutation => &self.mutation_fields,
        }
    }

    /// The service at `index` in service-list order.
    pub fn service(&self, index: usize) -> Option<&ServiceDefinition> {
        self.services.get(index)
    }

    /// Total number of query and mutation root fields.
    pub fn root_field_count(&self) -> usize {
        self.query_fields.len() + self.mutation_fields.len()
    }

    /// Whether both supergraphs were composed from identical subgraph SDL.
    pub fn same_sources(&self, other: &Supergraph) -> bool {
        self.services == other.services && self.sdls == other.sdls
    }
}

/// Root type names declared by one subgraph.
struct RootTypeNames {
    query: String,
    mutation: String,
}

impl RootTypeNames {
    fn of(document: &ast::Document) -> Self {
        let mut names = Self {
            query: OperationKind::Query.root_type_name().to_string(),
            mutation: OperationKind::Mutation.root_type_name().to_string(),
        };

        for definition in &document.definitions {
            let root_operations = match definition {
                ast::Definition::SchemaDefinition(schema) => &schema.root_operations,
                ast::Definition::SchemaExtension(extension) => &extension.root_operations,
                _ => continue,
            };
            for root in root_operations {
                let (operation_type, type_name) = &**root;
                match operation_type {
                    ast::OperationType::Query => names.query = type_name.to_string(),
                    ast::OperationType::Mutation => names.mutation = type_name.to_string(),
                    ast::OperationType::Subscription => {}
                }
            }
        }

        names
    }

    fn name_for(&self, kind: OperationKind) -> &str {
        match kind {
            OperationKind::Query => &self.query,
            OperationKind::Mutation => &self.mutation,
        }
    }
}

/// Collect the fields of `type_name` from definitions and extensions.
fn root_fields_of(
    document: &ast::Document,
    type_name: &str,
    service: usize,
) -> Vec<(String, Candidate)> {
    let mut collected = Vec::new();

    for definition in &document.definitions {
        let (name, directives, fields) = match definition {
            ast::Definition::ObjectTypeDefinition(object) => {
                (&object.name, &object.directives, &object.fields)
            }
            ast::Definition::ObjectTypeExtension(object) => {
                (&object.name, &object.directives, &object.fields)
            }
            _ => continue,
        };
        if name.as_str() != type_name {
            continue;
        }

        let type_shareable = has_directive(directives, "shareable");
        for field in fields {
            if INTERNAL_ROOT_FIELDS.contains(&field.name.as_str()) {
                continue;
            }
            collected.push((
                field.name.to_string(),
                Candidate {
                    service,
                    return_type: field.ty.to_string(),
                    shareable: type_shareable || has_directive(&field.directives, "shareable"),
                },
            ));
        }
    }

    collected
}

fn has_directive(directives: &ast::DirectiveList, name: &str) -> bool {
    directives.iter().any(|d| d.name.as_str() == name)
}

/// Pick an owner for every root field, reporting unresolvable conflicts.
fn resolve_owners(
    kind: OperationKind,
    candidates: BTreeMap<String, Vec<Candidate>>,
    subgraphs: &[(ServiceDefinition, String)],
    errors: &mut Vec<String>,
) -> BTreeMap<String, RootField> {
    let service_name = |index: usize| {
        subgraphs
            .get(index)
            .map_or("<unknown>", |(service, _)| service.name.as_str())
    };

    let mut owners = BTreeMap::new();
    for (field, mut defined_by) in candidates {
        // Duplicate definitions inside one service (type + extension) count once
        defined_by.dedup_by_key(|c| c.service);

        let Some(first) = defined_by.first() else {
            continue;
        };

        if defined_by.len() > 1 {
            let services: Vec<&str> = defined_by.iter().map(|c| service_name(c.service)).collect();

            if !defined_by.iter().all(|c| c.shareable) {
                errors.push(format!(
                    "Field \"{}.{}\" is defined in multiple services ({}) and is not @shareable in all of them",
                    kind.root_type_name(),
                    field,
                    services.join(", ")
                ));
                continue;
            }
            if defined_by.iter().any(|c| c.return_type != first.return_type) {
                errors.push(format!(
                    "Field \"{}.{}\" has conflicting return types across services ({})",
                    kind.root_type_name(),
                    field,
                    services.join(", ")
                ));
                continue;
            }
        }

        owners.insert(
            field,
            RootField {
                service: first.service,
                return_type: first.return_type.clone(),
            },
        );
    }
    owners
}
