//! Typed DQL request builder.
//!
//! Queries are assembled from validated predicate names and rendered with
//! every caller-supplied value bound as a query variable, so no value is
//! ever spliced into the query text.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use crate::error::{GraphError, Result};

/// Name of the single block every rendered query returns its rows under.
pub const RESULT_BLOCK: &str = "result";

/// Reserved key carrying a node's graph identifier.
pub const UID: &str = "uid";

/// Reserved predicate carrying a node's type.
pub const TYPE_PREDICATE: &str = "dgraph.type";

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') && !name.ends_with('.')
}

/// A validated predicate or type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Predicate(String);

impl Predicate {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if is_valid_name(&name) {
            Ok(Self(name))
        } else {
            Err(GraphError::InvalidArgument(format!(
                "invalid predicate name: {name:?}"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Format a vector as a Dgraph `float32vector` literal: `[v0,v1,...]`.
pub fn vector_literal(vector: &[f32]) -> String {
    let mut out = String::with_capacity(vector.len() * 8 + 2);
    out.push('[');
    for (i, v) in vector.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{v}");
    }
    out.push(']');
    out
}

/// Parse a `float32vector` literal back into its components.
pub fn parse_vector_literal(literal: &str) -> Option<Vec<f32>> {
    let inner = literal.trim().strip_prefix('[')?.strip_suffix(']')?.trim();
    if inner.is_empty() {
        return Some(Vec::new());
    }
    inner
        .split(',')
        .map(|part| part.trim().parse::<f32>().ok())
        .collect()
}

pub(crate) fn validate_vector(vector: &[f32]) -> Result<()> {
    if vector.is_empty() {
        return Err(GraphError::InvalidArgument("vector is empty".to_string()));
    }
    if let Some(pos) = vector.iter().position(|v| !v.is_finite()) {
        return Err(GraphError::InvalidArgument(format!(
            "vector component {pos} is not finite"
        )));
    }
    Ok(())
}

// ── Functions and filters ────────────────────────────────────────

/// A DQL function usable at the root of a query or inside `@filter`.
#[derive(Debug, Clone, PartialEq)]
pub enum Func {
    /// `eq(predicate, $value)`
    Eq { predicate: Predicate, value: String },
    /// `has(predicate)`
    Has(Predicate),
    /// `type(name)`
    Type(Predicate),
    /// `similar_to(predicate, top_k, $vector)`; only valid at the root.
    SimilarTo {
        predicate: Predicate,
        top_k: usize,
        vector: Vec<f32>,
    },
}

impl Func {
    fn render(&self, vars: &mut Variables) -> String {
        match self {
            Func::Eq { predicate, value } => {
                let var = vars.bind("string", value.clone());
                format!("eq({predicate}, {var})")
            }
            Func::Has(predicate) => format!("has({predicate})"),
            Func::Type(name) => format!("type({name})"),
            Func::SimilarTo {
                predicate,
                top_k,
                vector,
            } => {
                let var = vars.bind("float32vector", vector_literal(vector));
                format!("similar_to({predicate}, {top_k}, {var})")
            }
        }
    }
}

/// A root function plus zero or more conjunctive filter functions.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    root: Func,
    conjuncts: Vec<Func>,
}

impl Filter {
    /// Nodes whose `predicate` equals `value`.
    pub fn eq(predicate: &str, value: impl Into<String>) -> Result<Self> {
        Ok(Self::from_root(Func::Eq {
            predicate: Predicate::new(predicate)?,
            value: value.into(),
        }))
    }

    /// Nodes carrying any value for `predicate`.
    pub fn has(predicate: &str) -> Result<Self> {
        Ok(Self::from_root(Func::Has(Predicate::new(predicate)?)))
    }

    /// Nodes of the given type.
    pub fn of_type(node_type: &str) -> Result<Self> {
        Ok(Self::from_root(Func::Type(Predicate::new(node_type)?)))
    }

    pub(crate) fn similar_to(predicate: Predicate, top_k: usize, vector: Vec<f32>) -> Self {
        Self::from_root(Func::SimilarTo {
            predicate,
            top_k,
            vector,
        })
    }

    fn from_root(root: Func) -> Self {
        Self {
            root,
            conjuncts: Vec::new(),
        }
    }

    /// Narrow this filter: every function of `other` must also hold.
    pub fn and(mut self, other: Filter) -> Self {
        self.conjuncts.push(other.root);
        self.conjuncts.extend(other.conjuncts);
        self
    }

    pub fn root(&self) -> &Func {
        &self.root
    }

    pub fn conjuncts(&self) -> &[Func] {
        &self.conjuncts
    }
}

// ── Projection ───────────────────────────────────────────────────

/// One entry of a query body.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Uid,
    Scalar(Predicate),
    Nested(Predicate, Projection),
}

/// The list of predicates a query returns for each matched node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    fields: Vec<Field>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Include the node's graph identifier.
    pub fn uid(mut self) -> Self {
        self.fields.push(Field::Uid);
        self
    }

    pub fn field(mut self, name: &str) -> Result<Self> {
        self.fields.push(Self::entry(name)?);
        Ok(self)
    }

    pub fn fields<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        for name in names {
            self.fields.push(Self::entry(name)?);
        }
        Ok(self)
    }

    /// Follow the edge `name` and project `inner` on its targets.
    pub fn nested(mut self, name: &str, inner: Projection) -> Result<Self> {
        self.fields.push(Field::Nested(Predicate::new(name)?, inner));
        Ok(self)
    }

    /// Parse a query body such as `"uid PumpingStation.id PumpingStation.profiles { uid }"`.
    ///
    /// Fields are separated by whitespace; a `{ ... }` block after a field
    /// makes it a nested projection. Aliases and directives are rejected.
    pub fn parse(body: &str) -> Result<Self> {
        let mut tokens = tokenize(body).into_iter().peekable();
        let projection = Self::parse_block(&mut tokens, 0)?;
        if tokens.next().is_some() {
            return Err(GraphError::InvalidArgument(
                "unbalanced '}' in projection".to_string(),
            ));
        }
        Ok(projection)
    }

    fn parse_block<I>(tokens: &mut std::iter::Peekable<I>, depth: usize) -> Result<Self>
    where
        I: Iterator<Item = String>,
    {
        let mut projection = Projection::new();
        while let Some(token) = tokens.peek() {
            if token == "}" {
                if depth == 0 {
                    break;
                }
                tokens.next();
                return Ok(projection);
            }
            let Some(name) = tokens.next() else { break };
            if name == "{" {
                return Err(GraphError::InvalidArgument(
                    "'{' must follow a field name".to_string(),
                ));
            }
            if tokens.peek().map(String::as_str) == Some("{") {
                tokens.next();
                let inner = Self::parse_block(tokens, depth + 1)?;
                projection = projection.nested(&name, inner)?;
            } else {
                projection.fields.push(Self::entry(&name)?);
            }
        }
        if depth > 0 {
            return Err(GraphError::InvalidArgument(
                "unclosed '{' in projection".to_string(),
            ));
        }
        Ok(projection)
    }

    fn entry(name: &str) -> Result<Field> {
        if name == UID {
            Ok(Field::Uid)
        } else {
            Ok(Field::Scalar(Predicate::new(name)?))
        }
    }

    pub fn entries(&self) -> &[Field] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn render_into(&self, out: &mut String, indent: usize) {
        let pad = "  ".repeat(indent);
        for field in &self.fields {
            match field {
                Field::Uid => {
                    let _ = writeln!(out, "{pad}{UID}");
                }
                Field::Scalar(p) => {
                    let _ = writeln!(out, "{pad}{p}");
                }
                Field::Nested(p, inner) => {
                    let _ = writeln!(out, "{pad}{p} {{");
                    inner.render_into(out, indent + 1);
                    let _ = writeln!(out, "{pad}}}");
                }
            }
        }
    }
}

fn tokenize(body: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in body.chars() {
        if c == '{' || c == '}' || c.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            if !c.is_whitespace() {
                tokens.push(c.to_string());
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

// ── Requests ─────────────────────────────────────────────────────

#[derive(Default)]
struct Variables {
    declared: Vec<(String, &'static str)>,
    values: BTreeMap<String, String>,
}

impl Variables {
    fn bind(&mut self, ty: &'static str, value: String) -> String {
        let name = format!("$v{}", self.declared.len());
        self.declared.push((name.clone(), ty));
        self.values.insert(name.clone(), value);
        name
    }
}

/// A query text plus its variable bindings, ready for the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuery {
    pub text: String,
    pub variables: BTreeMap<String, String>,
}

/// A single-block read: filter, projection, optional row cap.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    filter: Filter,
    projection: Projection,
    first: Option<usize>,
}

impl QueryRequest {
    pub fn new(filter: Filter, projection: Projection) -> Self {
        Self {
            filter,
            projection,
            first: None,
        }
    }

    /// Cap the number of returned rows.
    pub fn first(mut self, n: usize) -> Self {
        self.first = Some(n);
        self
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn limit(&self) -> Option<usize> {
        self.first
    }

    /// Render to DQL text with all values bound as variables.
    pub fn render(&self) -> RenderedQuery {
        let mut vars = Variables::default();
        let root = self.filter.root.render(&mut vars);
        let conjuncts: Vec<String> = self
            .filter
            .conjuncts
            .iter()
            .map(|f| f.render(&mut vars))
            .collect();

        let mut block = format!("  {RESULT_BLOCK}(func: {root}");
        if let Some(n) = self.first {
            let _ = write!(block, ", first: {n}");
        }
        block.push(')');
        if !conjuncts.is_empty() {
            let _ = write!(block, " @filter({})", conjuncts.join(" AND "));
        }
        block.push_str(" {\n");
        self.projection.render_into(&mut block, 2);
        block.push_str("  }\n");

        let header = if vars.declared.is_empty() {
            "{\n".to_string()
        } else {
            let params: Vec<String> = vars
                .declared
                .iter()
                .map(|(name, ty)| format!("{name}: {ty}"))
                .collect();
            format!("query q({}) {{\n", params.join(", "))
        };

        RenderedQuery {
            text: format!("{header}{block}}}"),
            variables: vars.values,
        }
    }
}

/// Remove `predicates` from every node matching `filter`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRequest {
    filter: Filter,
    predicates: Vec<Predicate>,
}

impl DeleteRequest {
    pub fn new(filter: Filter, predicates: Vec<Predicate>) -> Result<Self> {
        if predicates.is_empty() {
            return Err(GraphError::InvalidArgument(
                "no predicates to delete".to_string(),
            ));
        }
        Ok(Self { filter, predicates })
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// The read that selects the uids this deletion applies to.
    pub fn target_query(&self) -> QueryRequest {
        QueryRequest::new(self.filter.clone(), Projection::new().uid())
    }
}
