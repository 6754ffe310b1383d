//! Method catalog: a dispatch table of typed, described domain methods.
//!
//! The catalog is built once at service start and immutable afterwards.
//! Methods are keyed by lower-cased name and arity; argument marshallers are
//! derived from the declared parameter types at construction time, not per
//! call. The same catalog produces the metadata document embedded into the
//! workflow-generation prompt.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use marketflow_core::registry::{InvokeError, MethodRegistry};

use crate::marshal;
use crate::types::{AslType, EnumTable, ParamSpec, TypeDef};

/// Failure inside a domain method.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HostError(pub String);

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Boxed async method adapter; receives already-coerced arguments.
pub type MethodHandler =
    Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Value, HostError>> + Send + Sync>;

/// A registered method: descriptors plus the invocation adapter.
pub struct Method {
    name: String,
    description: Option<String>,
    params: Vec<ParamSpec>,
    returns: AslType,
    handler: MethodHandler,
}

impl Method {
    pub fn new(name: impl Into<String>) -> MethodBuilder {
        MethodBuilder {
            name: name.into(),
            description: None,
            params: Vec::new(),
            returns: AslType::null(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Builder for a [`Method`]; finished by attaching the handler.
pub struct MethodBuilder {
    name: String,
    description: Option<String>,
    params: Vec<ParamSpec>,
    returns: AslType,
}

impl MethodBuilder {
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, ty: AslType) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            ty,
            description: None,
        });
        self
    }

    pub fn param_described(
        mut self,
        name: impl Into<String>,
        ty: AslType,
        description: impl Into<String>,
    ) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            ty,
            description: Some(description.into()),
        });
        self
    }

    pub fn returns(mut self, ty: AslType) -> Self {
        self.returns = ty;
        self
    }

    /// Attach the async adapter and finish the method.
    pub fn handler<F, Fut>(self, run: F) -> Method
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HostError>> + Send + 'static,
    {
        Method {
            name: self.name,
            description: self.description,
            params: self.params,
            returns: self.returns,
            handler: Arc::new(move |args| run(args).boxed()),
        }
    }
}

/// Immutable dispatch table over a set of domain methods.
pub struct MethodCatalog {
    methods: BTreeMap<(String, usize), Method>,
    types: BTreeMap<String, TypeDef>,
    enums: EnumTable,
}

impl MethodCatalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder {
            methods: BTreeMap::new(),
            types: BTreeMap::new(),
            enums: BTreeMap::new(),
        }
    }

    /// Resolve and invoke a method: case-insensitive on name, exact on
    /// arity. Arguments are coerced per the declared parameter types before
    /// the adapter runs; coercion failures arrive as nulls.
    pub async fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Value, InvokeError> {
        let key = (name.to_lowercase(), args.len());
        let Some(method) = self.methods.get(&key) else {
            return Err(InvokeError::NotFound {
                name: name.to_string(),
                arity: args.len(),
            });
        };
        let coerced: Vec<Value> = method
            .params
            .iter()
            .zip(args)
            .map(|(spec, value)| marshal::coerce(&spec.ty, value, &self.enums))
            .collect();
        debug!(method = %method.name, argc = coerced.len(), "method invoked");
        (method.handler)(coerced)
            .await
            .map_err(|error| InvokeError::Host(error.to_string()))
    }

    /// Registered display names, sorted.
    pub fn method_names(&self) -> Vec<&str> {
        self.methods.values().map(|method| method.name()).collect()
    }

    /// The LLM-facing metadata document: `Methods`, `Types`, and `Enums`.
    /// Generation is deterministic: identical catalogs yield structurally
    /// equal documents.
    pub fn metadata(&self) -> Value {
        let mut methods = Map::new();
        for method in self.methods.values() {
            let mut parameters = Map::new();
            for param in &method.params {
                parameters.insert(
                    param.name.clone(),
                    describe_type(&param.ty, param.description.as_deref()),
                );
            }
            let mut entry = Map::new();
            if let Some(description) = &method.description {
                entry.insert("Description".to_string(), json!(description));
            }
            entry.insert("Parameters".to_string(), Value::Object(parameters));
            entry.insert("Return".to_string(), describe_return(&method.returns));
            methods.insert(method.name.clone(), Value::Object(entry));
        }

        let mut types = Map::new();
        for (name, def) in &self.types {
            let mut properties = Map::new();
            for property in &def.properties {
                properties.insert(
                    property.name.clone(),
                    describe_type(&property.ty, property.description.as_deref()),
                );
            }
            let mut entry = Map::new();
            if let Some(description) = &def.description {
                entry.insert("Description".to_string(), json!(description));
            }
            entry.insert("Properties".to_string(), Value::Object(properties));
            types.insert(name.clone(), Value::Object(entry));
        }

        let mut enums = Map::new();
        for (name, members) in &self.enums {
            enums.insert(name.clone(), json!(members));
        }

        json!({"Methods": methods, "Types": types, "Enums": enums})
    }
}

fn describe_type(ty: &AslType, description: Option<&str>) -> Value {
    let mut entry = Map::new();
    entry.insert("Type".to_string(), json!(ty.to_string()));
    if let Some(description) = description {
        entry.insert("Description".to_string(), json!(description));
    }
    if let Some(format) = ty.effective_format() {
        entry.insert("Format".to_string(), json!(format.render()));
    }
    Value::Object(entry)
}

fn describe_return(ty: &AslType) -> Value {
    match ty.effective_format() {
        Some(format) => json!({"Type": ty.to_string(), "Format": format.render()}),
        None => json!(ty.to_string()),
    }
}

#[async_trait]
impl MethodRegistry for MethodCatalog {
    async fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Value, InvokeError> {
        MethodCatalog::invoke(self, name, args).await
    }
}

/// Accumulates methods, composite types, and enums, then freezes them.
pub struct CatalogBuilder {
    methods: BTreeMap<(String, usize), Method>,
    types: BTreeMap<String, TypeDef>,
    enums: EnumTable,
}

impl CatalogBuilder {
    pub fn method(mut self, method: Method) -> Self {
        let key = (method.name.to_lowercase(), method.arity());
        if self.methods.insert(key, method).is_some() {
            warn!("catalog method registered twice; last registration wins");
        }
        self
    }

    pub fn composite(mut self, name: impl Into<String>, def: TypeDef) -> Self {
        self.types.insert(name.into(), def);
        self
    }

    pub fn enumeration<M>(mut self, name: impl Into<String>, members: M) -> Self
    where
        M: IntoIterator,
        M::Item: Into<String>,
    {
        self.enums.insert(
            name.into(),
            members.into_iter().map(Into::into).collect(),
        );
        self
    }

    pub fn build(self) -> MethodCatalog {
        MethodCatalog {
            methods: self.methods,
            types: self.types,
            enums: self.enums,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn toy_catalog() -> MethodCatalog {
        MethodCatalog::builder()
            .enumeration("Mood", ["Happy", "Sad"])
            .composite(
                "Point",
                TypeDef::new()
                    .describe("A 2D point")
                    .property("x", AslType::number())
                    .property("y", AslType::number()),
            )
            .method(
                Method::new("Double")
                    .describe("Doubles a number")
                    .param_described("value", AslType::number(), "The number to double")
                    .returns(AslType::number())
                    .handler(|args| async move {
                        let doubled = marshal::as_number(marshal::arg(&args, 0))
                            .ok_or_else(|| HostError::new("value is required"))?
                            * 2.0;
                        Ok(json!(doubled))
                    }),
            )
            .method(
                Method::new("Mood")
                    .param("mood", AslType::enumeration("Mood"))
                    .returns(AslType::string())
                    .handler(|args| async move { Ok(marshal::arg(&args, 0).clone()) }),
            )
            .build()
    }

    #[test]
    fn test_invoke_is_case_insensitive_and_arity_exact() {
        tokio_test::block_on(async {
            let catalog = toy_catalog();
            let result = catalog.invoke("double", vec![json!(4)]).await.unwrap();
            assert_eq!(result, json!(8.0));

            let wrong_arity = catalog.invoke("Double", vec![json!(1), json!(2)]).await;
            assert!(matches!(wrong_arity, Err(InvokeError::NotFound { .. })));
        });
    }

    #[test]
    fn test_invoke_coerces_arguments_before_the_handler() {
        tokio_test::block_on(async {
            let catalog = toy_catalog();
            let result = catalog.invoke("Double", vec![json!("21")]).await.unwrap();
            assert_eq!(result, json!(42.0));

            let canonical = catalog.invoke("Mood", vec![json!("happy")]).await.unwrap();
            assert_eq!(canonical, json!("Happy"));
        });
    }

    #[test]
    fn test_handler_failures_become_host_errors() {
        tokio_test::block_on(async {
            let catalog = toy_catalog();
            let result = catalog.invoke("Double", vec![json!("junk")]).await;
            match result {
                Err(InvokeError::Host(message)) => assert_eq!(message, "value is required"),
                other => panic!("expected a host error, got {other:?}"),
            }
        });
    }

    #[test]
    fn test_metadata_document_shape() {
        let metadata = toy_catalog().metadata();
        assert_eq!(
            metadata["Methods"]["Double"]["Description"],
            json!("Doubles a number")
        );
        assert_eq!(
            metadata["Methods"]["Double"]["Parameters"]["value"]["Type"],
            json!("number")
        );
        assert_eq!(metadata["Methods"]["Double"]["Return"], json!("number"));
        assert_eq!(
            metadata["Methods"]["Mood"]["Parameters"]["mood"]["Format"],
            json!("enum:Mood")
        );
        assert_eq!(metadata["Enums"]["Mood"], json!(["Happy", "Sad"]));
        assert_eq!(
            metadata["Types"]["Point"]["Properties"]["x"]["Type"],
            json!("number")
        );
    }

    #[test]
    fn test_metadata_generation_is_idempotent() {
        let catalog = toy_catalog();
        assert_eq!(catalog.metadata(), catalog.metadata());
        // A second identically-built catalog agrees too.
        assert_eq!(catalog.metadata(), toy_catalog().metadata());
    }
}
