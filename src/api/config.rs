//! # Per-Model API Configuration

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// HTTP methods exposed for one model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodSet(BTreeSet<String>);

impl MethodSet {
    pub fn new<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            methods
                .into_iter()
                .map(|m| m.as_ref().to_ascii_uppercase())
                .collect(),
        )
    }

    /// GET, POST, PUT, PATCH and DELETE
    pub fn all() -> Self {
        Self::new(["GET", "POST", "PUT", "PATCH", "DELETE"])
    }

    pub fn allows(&self, method: &str) -> bool {
        self.0.iter().any(|m| m.eq_ignore_ascii_case(method))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for MethodSet {
    /// Read-only
    fn default() -> Self {
        Self::new(["GET"])
    }
}

/// Options for one model's API. Unset pagination and depth values fall back
/// to the registry's `ApiDefaults`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub methods: MethodSet,

    /// URL segment for the model; defaults to the model name
    pub collection_name: Option<String>,

    /// Allow PATCH/PUT and DELETE on the collection itself, driven by `q`
    pub allow_patch_many: bool,

    /// Honour the `X-HTTP-Method-Override` header
    pub allow_method_override: bool,

    pub include_columns: Option<Vec<String>>,
    pub exclude_columns: Option<Vec<String>>,

    pub results_per_page: Option<u64>,
    pub max_results_per_page: Option<u64>,
    pub max_depth: Option<usize>,
}

impl ApiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.methods = MethodSet::new(methods);
        self
    }

    pub fn all_methods(mut self) -> Self {
        self.methods = MethodSet::all();
        self
    }

    pub fn collection_name(mut self, name: impl Into<String>) -> Self {
        self.collection_name = Some(name.into());
        self
    }

    pub fn allow_patch_many(mut self, allow: bool) -> Self {
        self.allow_patch_many = allow;
        self
    }

    pub fn allow_method_override(mut self, allow: bool) -> Self {
        self.allow_method_override = allow;
        self
    }

    pub fn include_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn exclude_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn results_per_page(mut self, n: u64) -> Self {
        self.results_per_page = Some(n);
        self
    }

    pub fn max_results_per_page(mut self, n: u64) -> Self {
        self.max_results_per_page = Some(n);
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }
}
