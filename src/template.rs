//! The template engine. Resolves a template source against a [`Context`]
//! into final HTML text. Supported directives, in resolution order:
//!
//! 1. Layout inheritance: `{% extends "base" %}` plus
//!    `{% block name %}…{% endblock %}` overrides, recursively for
//!    multi-level inheritance.
//! 2. Static includes: `{% include "name" %}`, rendered with the same
//!    context and spliced in place.
//! 3. Conditionals: `{% if expr %}…{% else %}…{% endif %}` where `expr` is a
//!    bare identifier, dot-path, or literal combined with `and`/`or`.
//!    Missing context paths evaluate to falsy rather than erroring.
//! 4. Loops: `{% for x in collection %}…{% endfor %}`, binding the loop
//!    variable in a nested scope that shadows outer bindings.
//! 5. Interpolation: `{{ path }}`, optionally piped through a filter
//!    (`{{ path | urlencode }}`).
//!
//! Conditions are parsed into an explicit expression tree ([`Expr`]) and
//! interpreted against the context map; there is no dynamic code evaluation.
//! Recursive `extends`/`include` resolution carries a visiting set through
//! the call chain, so self-referential templates fail with [`Error::Cycle`]
//! instead of overflowing the stack.
//!
//! Parsed templates are cached by name behind a mutex. The cache belongs to
//! the [`Engine`] instance; callers that want a cold start for a fresh build
//! either call [`Engine::invalidate`] or construct a new engine.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::value::Context;

/// Renders templates loaded from a directory, caching parsed templates by
/// name.
pub struct Engine {
    directory: PathBuf,
    cache: Mutex<HashMap<String, Arc<Template>>>,
}

impl Engine {
    /// Creates an engine that loads templates from `directory`. A template
    /// named `base` is read from `{directory}/base.html`.
    pub fn new<P: AsRef<Path>>(directory: P) -> Engine {
        Engine {
            directory: directory.as_ref().to_owned(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Registers an in-memory template source under `name`, bypassing the
    /// file system. Later loads of `name` hit the cache entry.
    pub fn add_source(&self, name: &str, source: &str) -> Result<()> {
        let template = Arc::new(Template::parse(name, source)?);
        self.lock_cache().insert(name.to_owned(), template);
        Ok(())
    }

    /// Drops every cached template so the next render re-reads sources from
    /// disk.
    pub fn invalidate(&self) {
        self.lock_cache().clear();
    }

    /// Renders the named template against `context`. Any directive syntax
    /// left over after resolution is stripped from the output rather than
    /// leaked into shipped HTML.
    pub fn render(&self, name: &str, context: &Context) -> Result<String> {
        let mut visiting = HashSet::new();
        let output = self.render_template(name, context, &mut visiting)?;
        Ok(strip_markers(&output))
    }

    /// Renders a template by name, resolving its inheritance chain. The
    /// `visiting` set tracks the template names on the current resolution
    /// call chain for cycle detection.
    fn render_template(
        &self,
        name: &str,
        context: &Context,
        visiting: &mut HashSet<String>,
    ) -> Result<String> {
        if !visiting.insert(name.to_owned()) {
            return Err(Error::Cycle {
                template: name.to_owned(),
            });
        }

        // Walk the extends chain child-first, collecting each template.
        let mut chain = vec![self.template(name)?];
        let mut chain_names = vec![name.to_owned()];
        while let Some(parent) = chain.last().and_then(|t| t.extends.clone())
        {
            if !visiting.insert(parent.clone()) {
                return Err(Error::Cycle { template: parent });
            }
            chain.push(self.template(&parent)?);
            chain_names.push(parent);
        }

        // The effective block set: the most-derived definition wins.
        let mut blocks: HashMap<&str, &Vec<Node>> = HashMap::new();
        for template in &chain {
            for (block_name, body) in &template.blocks {
                blocks.entry(block_name.as_str()).or_insert(body);
            }
        }

        // Render the root of the chain; block placeholders pull from the
        // effective block set.
        let root = chain.last().ok_or_else(|| Error::Cycle {
            template: name.to_owned(),
        })?;
        let mut output = String::new();
        self.render_nodes(&root.nodes, context, &blocks, visiting, &mut output)?;

        for chained in chain_names {
            visiting.remove(&chained);
        }
        Ok(output)
    }

    fn render_nodes(
        &self,
        nodes: &[Node],
        context: &Context,
        blocks: &HashMap<&str, &Vec<Node>>,
        visiting: &mut HashSet<String>,
        output: &mut String,
    ) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text(text) => output.push_str(text),
                Node::Var { path, filter } => {
                    let rendered = match context.lookup(path) {
                        Some(value) => value.render(),
                        None => String::new(),
                    };
                    output.push_str(&match filter {
                        Some(f) => f.apply(&rendered),
                        None => rendered,
                    });
                }
                Node::If {
                    condition,
                    then,
                    otherwise,
                } => {
                    let branch = match condition.truthy(context) {
                        true => then,
                        false => otherwise,
                    };
                    self.render_nodes(branch, context, blocks, visiting, output)?;
                }
                Node::For { var, path, body } => {
                    let items = match context.lookup(path) {
                        Some(crate::value::Value::List(items)) => items.clone(),
                        _ => Vec::new(),
                    };
                    for item in items {
                        let scope = context.scoped(var, item);
                        self.render_nodes(body, &scope, blocks, visiting, output)?;
                    }
                }
                Node::Include { name } => {
                    let included =
                        self.render_template(name, context, visiting)?;
                    output.push_str(&included);
                }
                Node::Block { name, body } => {
                    let effective =
                        blocks.get(name.as_str()).copied().unwrap_or(body);
                    self.render_nodes(
                        effective, context, blocks, visiting, output,
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Loads (and caches) a parsed template by name.
    fn template(&self, name: &str) -> Result<Arc<Template>> {
        if let Some(template) = self.lock_cache().get(name) {
            return Ok(Arc::clone(template));
        }

        let path = self.directory.join(format!("{}.html", name));
        let source =
            std::fs::read_to_string(&path).map_err(|err| Error::Load {
                name: name.to_owned(),
                path: path.clone(),
                err,
            })?;
        let template = Arc::new(Template::parse(name, &source)?);

        // Two renders can race to fill the same entry; the duplicate parse
        // is tolerable, a corrupted cache is not.
        Ok(Arc::clone(
            self.lock_cache()
                .entry(name.to_owned())
                .or_insert(template),
        ))
    }

    fn lock_cache(
        &self,
    ) -> std::sync::MutexGuard<HashMap<String, Arc<Template>>> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// A parsed template: its node tree, the layout it extends (if any), and
/// the blocks it defines.
struct Template {
    extends: Option<String>,
    nodes: Vec<Node>,
    blocks: HashMap<String, Vec<Node>>,
}

impl Template {
    fn parse(name: &str, source: &str) -> Result<Template> {
        let tokens = lex(name, source)?;
        let mut parser = Parser {
            name,
            tokens,
            position: 0,
            extends: None,
        };
        let (nodes, terminator) = parser.parse_nodes(&[])?;
        if let Some(terminator) = terminator {
            return Err(parser.syntax(format!(
                "unexpected `{{% {} %}}` outside its opening directive",
                terminator
            )));
        }

        let mut blocks = HashMap::new();
        collect_blocks(&nodes, &mut blocks);
        Ok(Template {
            extends: parser.extends,
            nodes,
            blocks,
        })
    }
}

/// Records every `{% block %}` definition in a node tree, including blocks
/// nested inside conditionals and loops.
fn collect_blocks(nodes: &[Node], blocks: &mut HashMap<String, Vec<Node>>) {
    for node in nodes {
        match node {
            Node::Block { name, body } => {
                blocks.insert(name.clone(), body.clone());
                collect_blocks(body, blocks);
            }
            Node::If { then, otherwise, .. } => {
                collect_blocks(then, blocks);
                collect_blocks(otherwise, blocks);
            }
            Node::For { body, .. } => collect_blocks(body, blocks),
            _ => {}
        }
    }
}

/// A node in a parsed template.
#[derive(Clone, Debug)]
enum Node {
    Text(String),
    Var {
        path: String,
        filter: Option<Filter>,
    },
    If {
        condition: Expr,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
    For {
        var: String,
        path: String,
        body: Vec<Node>,
    },
    Include {
        name: String,
    },
    Block {
        name: String,
        body: Vec<Node>,
    },
}

/// An interpolation filter, applied with pipe syntax: `{{ path | filter }}`.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Filter {
    /// Percent-encodes the value for use inside a URL.
    UrlEncode,
    /// HTML-escapes the value.
    Escape,
}

impl Filter {
    fn parse(name: &str) -> Option<Filter> {
        match name {
            "urlencode" => Some(Filter::UrlEncode),
            "escape" => Some(Filter::Escape),
            _ => None,
        }
    }

    fn apply(self, input: &str) -> String {
        match self {
            Filter::UrlEncode => {
                url::form_urlencoded::byte_serialize(input.as_bytes())
                    .collect()
            }
            Filter::Escape => input
                .replace('&', "&amp;")
                .replace('<', "&lt;")
                .replace('>', "&gt;")
                .replace('"', "&quot;"),
        }
    }
}

/// A boolean expression over context paths and literals. Interpreted by a
/// tree walk against the context; an unresolvable path is simply falsy.
#[derive(Clone, Debug)]
enum Expr {
    Path(String),
    Literal(bool),
    Str(String),
    Int(i64),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    fn truthy(&self, context: &Context) -> bool {
        match self {
            Expr::Path(path) => context
                .lookup(path)
                .map(|value| value.truthy())
                .unwrap_or(false),
            Expr::Literal(b) => *b,
            Expr::Str(s) => !s.is_empty(),
            Expr::Int(n) => *n != 0,
            Expr::And(left, right) => {
                left.truthy(context) && right.truthy(context)
            }
            Expr::Or(left, right) => {
                left.truthy(context) || right.truthy(context)
            }
        }
    }
}

/// A lexed template token.
enum Token {
    Text(String),
    /// The inside of a `{{ … }}` tag, trimmed.
    Var(String),
    /// The inside of a `{% … %}` tag, trimmed.
    Directive(String),
}

/// Splits a template source into text, variable, and directive tokens.
fn lex(name: &str, source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = source;
    loop {
        let var = rest.find("{{");
        let directive = rest.find("{%");
        let (start, open, close) = match (var, directive) {
            (None, None) => {
                if !rest.is_empty() {
                    tokens.push(Token::Text(rest.to_owned()));
                }
                return Ok(tokens);
            }
            (Some(v), Some(d)) if v < d => (v, "{{", "}}"),
            (Some(v), None) => (v, "{{", "}}"),
            (_, Some(d)) => (d, "{%", "%}"),
        };

        if start > 0 {
            tokens.push(Token::Text(rest[..start].to_owned()));
        }
        let after_open = &rest[start + open.len()..];
        let end = after_open.find(close).ok_or_else(|| Error::Syntax {
            template: name.to_owned(),
            message: format!("unclosed `{}` tag", open),
        })?;
        let inner = after_open[..end].trim().to_owned();
        match open {
            "{{" => tokens.push(Token::Var(inner)),
            _ => tokens.push(Token::Directive(inner)),
        }
        rest = &after_open[end + close.len()..];
    }
}

struct Parser<'a> {
    name: &'a str,
    tokens: Vec<Token>,
    position: usize,
    extends: Option<String>,
}

impl<'a> Parser<'a> {
    /// Parses nodes until one of `terminators` (an `else`/`endif`-style
    /// closing directive) or the end of input. Returns the nodes and the
    /// terminator that stopped the parse, if any.
    fn parse_nodes(
        &mut self,
        terminators: &[&str],
    ) -> Result<(Vec<Node>, Option<String>)> {
        let mut nodes = Vec::new();
        while self.position < self.tokens.len() {
            let token = &self.tokens[self.position];
            self.position += 1;
            match token {
                Token::Text(text) => nodes.push(Node::Text(text.clone())),
                Token::Var(inner) => nodes.push(self.parse_var(inner)?),
                Token::Directive(inner) => {
                    let inner = inner.clone();
                    let keyword =
                        inner.split_whitespace().next().unwrap_or("");
                    if terminators.contains(&keyword) {
                        return Ok((nodes, Some(keyword.to_owned())));
                    }
                    nodes.push(match self.parse_directive(&inner, keyword)? {
                        Some(node) => node,
                        None => continue,
                    });
                }
            }
        }
        Ok((nodes, None))
    }

    fn parse_var(&self, inner: &str) -> Result<Node> {
        let mut parts = inner.splitn(2, '|');
        let path = parts.next().unwrap_or("").trim().to_owned();
        if path.is_empty() {
            return Err(self.syntax("empty `{{ }}` tag".to_owned()));
        }
        let filter = match parts.next() {
            None => None,
            Some(raw) => {
                let raw = raw.trim();
                Some(Filter::parse(raw).ok_or_else(|| {
                    self.syntax(format!("unknown filter `{}`", raw))
                })?)
            }
        };
        Ok(Node::Var { path, filter })
    }

    /// Parses one directive. Returns `None` for directives that don't
    /// produce a node (`extends`).
    fn parse_directive(
        &mut self,
        inner: &str,
        keyword: &str,
    ) -> Result<Option<Node>> {
        let rest = inner[keyword.len()..].trim();
        match keyword {
            "extends" => {
                if self.extends.is_some() {
                    return Err(self.syntax(
                        "template declares `extends` twice".to_owned(),
                    ));
                }
                self.extends = Some(self.parse_name(rest)?);
                Ok(None)
            }
            "include" => Ok(Some(Node::Include {
                name: self.parse_name(rest)?,
            })),
            "if" => {
                let condition = parse_expr(self.name, rest)?;
                let (then, terminator) =
                    self.parse_nodes(&["else", "endif"])?;
                let (otherwise, terminator) = match terminator.as_deref() {
                    Some("else") => self.parse_nodes(&["endif"])?,
                    _ => (Vec::new(), terminator),
                };
                match terminator.as_deref() {
                    Some("endif") => Ok(Some(Node::If {
                        condition,
                        then,
                        otherwise,
                    })),
                    _ => Err(self
                        .syntax("`{% if %}` without `{% endif %}`".to_owned())),
                }
            }
            "for" => {
                let mut parts = rest.split_whitespace();
                let var = parts.next().unwrap_or("").to_owned();
                let keyword_in = parts.next().unwrap_or("");
                let path = parts.next().unwrap_or("").to_owned();
                if var.is_empty() || keyword_in != "in" || path.is_empty() {
                    return Err(self.syntax(format!(
                        "malformed loop `{{% {} %}}`; expected \
                         `for <var> in <path>`",
                        inner
                    )));
                }
                let (body, terminator) = self.parse_nodes(&["endfor"])?;
                match terminator.as_deref() {
                    Some("endfor") => Ok(Some(Node::For { var, path, body })),
                    _ => Err(self.syntax(
                        "`{% for %}` without `{% endfor %}`".to_owned(),
                    )),
                }
            }
            "block" => {
                let name = match rest.is_empty() {
                    true => {
                        return Err(
                            self.syntax("`{% block %}` missing a name".to_owned())
                        )
                    }
                    false => rest.to_owned(),
                };
                let (body, terminator) = self.parse_nodes(&["endblock"])?;
                match terminator.as_deref() {
                    Some("endblock") => Ok(Some(Node::Block { name, body })),
                    _ => Err(self.syntax(
                        "`{% block %}` without `{% endblock %}`".to_owned(),
                    )),
                }
            }
            _ => Err(self.syntax(format!("unknown directive `{}`", keyword))),
        }
    }

    /// Parses the (optionally quoted) template name argument of `extends`
    /// and `include`.
    fn parse_name(&self, raw: &str) -> Result<String> {
        let name = raw.trim_matches('"');
        if name.is_empty() {
            return Err(self.syntax("directive missing a template name".to_owned()));
        }
        Ok(name.to_owned())
    }

    fn syntax(&self, message: String) -> Error {
        Error::Syntax {
            template: self.name.to_owned(),
            message,
        }
    }
}

/// Parses a conditional expression: paths and literals combined with `and`
/// and `or`, where `and` binds tighter than `or`.
fn parse_expr(template: &str, input: &str) -> Result<Expr> {
    let words = lex_expr(template, input)?;
    let mut stream = words.into_iter().peekable();
    let expr = parse_or(template, &mut stream)?;
    match stream.next() {
        None => Ok(expr),
        Some(word) => Err(Error::Syntax {
            template: template.to_owned(),
            message: format!("unexpected `{}` in condition", word),
        }),
    }
}

type Words = std::iter::Peekable<std::vec::IntoIter<ExprWord>>;

/// One word of a condition: either a quoted string literal or a bare word.
#[derive(Clone, Debug)]
enum ExprWord {
    Quoted(String),
    Bare(String),
}

impl fmt::Display for ExprWord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExprWord::Quoted(s) => write!(f, "\"{}\"", s),
            ExprWord::Bare(s) => s.fmt(f),
        }
    }
}

fn lex_expr(template: &str, input: &str) -> Result<Vec<ExprWord>> {
    let mut words = Vec::new();
    let mut rest = input.trim();
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('"') {
            let end = after.find('"').ok_or_else(|| Error::Syntax {
                template: template.to_owned(),
                message: format!("unterminated string in condition `{}`", input),
            })?;
            words.push(ExprWord::Quoted(after[..end].to_owned()));
            rest = after[end + 1..].trim_start();
        } else {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            words.push(ExprWord::Bare(rest[..end].to_owned()));
            rest = rest[end..].trim_start();
        }
    }
    Ok(words)
}

fn parse_or(template: &str, words: &mut Words) -> Result<Expr> {
    let mut left = parse_and(template, words)?;
    while matches!(words.peek(), Some(ExprWord::Bare(w)) if w == "or") {
        words.next();
        let right = parse_and(template, words)?;
        left = Expr::Or(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_and(template: &str, words: &mut Words) -> Result<Expr> {
    let mut left = parse_term(template, words)?;
    while matches!(words.peek(), Some(ExprWord::Bare(w)) if w == "and") {
        words.next();
        let right = parse_term(template, words)?;
        left = Expr::And(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_term(template: &str, words: &mut Words) -> Result<Expr> {
    match words.next() {
        Some(ExprWord::Quoted(s)) => Ok(Expr::Str(s)),
        Some(ExprWord::Bare(word)) => match word.as_str() {
            "true" => Ok(Expr::Literal(true)),
            "false" => Ok(Expr::Literal(false)),
            "and" | "or" => Err(Error::Syntax {
                template: template.to_owned(),
                message: format!("`{}` is missing an operand", word),
            }),
            _ => match word.parse::<i64>() {
                Ok(n) => Ok(Expr::Int(n)),
                Err(_) => Ok(Expr::Path(word)),
            },
        },
        None => Err(Error::Syntax {
            template: template.to_owned(),
            message: "empty condition".to_owned(),
        }),
    }
}

/// Removes any residual `{{ … }}` / `{% … %}` spans from rendered output.
/// Directive syntax that survives resolution (for example, markers embedded
/// in the source text) must not leak into shipped HTML.
fn strip_markers(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    loop {
        let next = match (rest.find("{{"), rest.find("{%")) {
            (None, None) => {
                output.push_str(rest);
                return output;
            }
            (Some(v), Some(d)) => v.min(d),
            (Some(v), None) => v,
            (None, Some(d)) => d,
        };
        output.push_str(&rest[..next]);
        let close = match &rest[next..next + 2] {
            "{{" => "}}",
            _ => "%}",
        };
        match rest[next + 2..].find(close) {
            Some(end) => rest = &rest[next + 2 + end + close.len()..],
            // Unpaired opener: drop the marker itself and continue.
            None => rest = &rest[next + 2..],
        }
    }
}

/// The result of a fallible template operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading, parsing, or rendering a template.
#[derive(Debug)]
pub enum Error {
    /// Returned when a template source cannot be read.
    Load {
        name: String,
        path: PathBuf,
        err: io::Error,
    },

    /// Returned for template syntax the engine cannot parse.
    Syntax { template: String, message: String },

    /// Returned when `extends`/`include` resolution revisits a template
    /// already on the call chain.
    Cycle { template: String },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Load { name, path, err } => write!(
                f,
                "loading template `{}` from `{}`: {}",
                name,
                path.display(),
                err
            ),
            Error::Syntax { template, message } => {
                write!(f, "template `{}`: {}", template, message)
            }
            Error::Cycle { template } => write!(
                f,
                "template `{}` is part of an extends/include cycle",
                template
            ),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Load { err, .. } => Some(err),
            Error::Syntax { .. } => None,
            Error::Cycle { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{map, Value};

    fn engine_with(sources: &[(&str, &str)]) -> Engine {
        let engine = Engine::new("/nonexistent");
        for (name, source) in sources {
            engine.add_source(name, source).unwrap();
        }
        engine
    }

    fn render_one(source: &str, context: &Context) -> Result<String> {
        let engine = Engine::new("/nonexistent");
        engine.add_source("page", source)?;
        engine.render("page", context)
    }

    #[test]
    fn test_interpolation() {
        let mut ctx = Context::new();
        ctx.insert("post", map(vec![("title", Value::from("Hello"))]));
        assert_eq!(
            render_one("<h1>{{ post.title }}</h1>", &ctx).unwrap(),
            "<h1>Hello</h1>"
        );
    }

    #[test]
    fn test_unresolved_variable_renders_empty() {
        let ctx = Context::new();
        assert_eq!(render_one("a{{ missing }}b", &ctx).unwrap(), "ab");
    }

    #[test]
    fn test_urlencode_filter() {
        let mut ctx = Context::new();
        ctx.insert("tag", "a b&c");
        assert_eq!(
            render_one("{{ tag | urlencode }}", &ctx).unwrap(),
            "a+b%26c"
        );
    }

    #[test]
    fn test_escape_filter() {
        let mut ctx = Context::new();
        ctx.insert("title", "<b>&</b>");
        assert_eq!(
            render_one("{{ title | escape }}", &ctx).unwrap(),
            "&lt;b&gt;&amp;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_unknown_filter_is_syntax_error() {
        let ctx = Context::new();
        assert!(matches!(
            render_one("{{ x | shout }}", &ctx),
            Err(Error::Syntax { .. })
        ));
    }

    #[test]
    fn test_conditional_truthy() {
        let mut ctx = Context::new();
        ctx.insert("draft", true);
        assert_eq!(
            render_one("{% if draft %}d{% else %}p{% endif %}", &ctx)
                .unwrap(),
            "d"
        );
    }

    #[test]
    fn test_conditional_missing_path_takes_else() {
        let ctx = Context::new();
        assert_eq!(
            render_one(
                "{% if post.missing.deeper %}y{% else %}n{% endif %}",
                &ctx
            )
            .unwrap(),
            "n"
        );
    }

    #[test]
    fn test_conditional_missing_path_without_else() {
        let ctx = Context::new();
        assert_eq!(
            render_one("a{% if nope %}y{% endif %}b", &ctx).unwrap(),
            "ab"
        );
    }

    #[test]
    fn test_boolean_operators() {
        let mut ctx = Context::new();
        ctx.insert("a", true);
        ctx.insert("b", false);
        let fixture = |cond: &str| {
            render_one(
                &format!("{{% if {} %}}y{{% else %}}n{{% endif %}}", cond),
                &ctx,
            )
            .unwrap()
        };
        assert_eq!(fixture("a and b"), "n");
        assert_eq!(fixture("a or b"), "y");
        assert_eq!(fixture("b or missing"), "n");
        // `and` binds tighter than `or`.
        assert_eq!(fixture("a or b and false"), "y");
        assert_eq!(fixture("true and a"), "y");
    }

    #[test]
    fn test_loop() {
        let mut ctx = Context::new();
        ctx.insert(
            "tags",
            vec![Value::from("a"), Value::from("b"), Value::from("c")],
        );
        assert_eq!(
            render_one("{% for t in tags %}[{{ t }}]{% endfor %}", &ctx)
                .unwrap(),
            "[a][b][c]"
        );
    }

    #[test]
    fn test_loop_shadowing_and_nesting() {
        let mut ctx = Context::new();
        ctx.insert("t", "outer");
        ctx.insert("tags", vec![Value::from("x"), Value::from("")]);
        assert_eq!(
            render_one(
                "{% for t in tags %}{% if t %}<{{ t }}>{% endif %}{% endfor %}{{ t }}",
                &ctx
            )
            .unwrap(),
            "<x>outer"
        );
    }

    #[test]
    fn test_loop_over_missing_collection() {
        let ctx = Context::new();
        assert_eq!(
            render_one("a{% for x in nope %}{{ x }}{% endfor %}b", &ctx)
                .unwrap(),
            "ab"
        );
    }

    #[test]
    fn test_include() {
        let engine = engine_with(&[
            ("page", "a{% include \"nav\" %}c"),
            ("nav", "<nav>{{ label }}</nav>"),
        ]);
        let mut ctx = Context::new();
        ctx.insert("label", "b");
        assert_eq!(engine.render("page", &ctx).unwrap(), "a<nav>b</nav>c");
    }

    #[test]
    fn test_extends_block_substitution() {
        let engine = engine_with(&[
            ("base", "<html>{% block content %}{% endblock %}</html>"),
            (
                "child",
                "{% extends \"base\" %}{% block content %}Hi{% endblock %}",
            ),
        ]);
        assert_eq!(
            engine.render("child", &Context::new()).unwrap(),
            "<html>Hi</html>"
        );
    }

    #[test]
    fn test_multi_level_extends() {
        let engine = engine_with(&[
            (
                "base",
                "[{% block head %}h{% endblock %}|{% block body %}b{% endblock %}]",
            ),
            (
                "mid",
                "{% extends \"base\" %}{% block body %}mid-body{% endblock %}",
            ),
            (
                "leaf",
                "{% extends \"mid\" %}{% block head %}leaf-head{% endblock %}",
            ),
        ]);
        assert_eq!(
            engine.render("leaf", &Context::new()).unwrap(),
            "[leaf-head|mid-body]"
        );
    }

    #[test]
    fn test_parent_default_block_body() {
        let engine = engine_with(&[
            ("base", "<p>{% block content %}default{% endblock %}</p>"),
            ("child", "{% extends \"base\" %}"),
        ]);
        assert_eq!(
            engine.render("child", &Context::new()).unwrap(),
            "<p>default</p>"
        );
    }

    #[test]
    fn test_extends_cycle_detected() {
        let engine = engine_with(&[
            ("a", "{% extends \"b\" %}"),
            ("b", "{% extends \"a\" %}"),
        ]);
        assert!(matches!(
            engine.render("a", &Context::new()),
            Err(Error::Cycle { .. })
        ));
    }

    #[test]
    fn test_self_extends_detected() {
        let engine = engine_with(&[("a", "{% extends \"a\" %}")]);
        assert!(matches!(
            engine.render("a", &Context::new()),
            Err(Error::Cycle { .. })
        ));
    }

    #[test]
    fn test_include_cycle_detected() {
        let engine = engine_with(&[
            ("a", "{% include \"b\" %}"),
            ("b", "{% include \"a\" %}"),
        ]);
        assert!(matches!(
            engine.render("a", &Context::new()),
            Err(Error::Cycle { .. })
        ));
    }

    #[test]
    fn test_repeated_include_is_not_a_cycle() {
        let engine = engine_with(&[
            ("page", "{% include \"x\" %}{% include \"x\" %}"),
            ("x", "y"),
        ]);
        assert_eq!(engine.render("page", &Context::new()).unwrap(), "yy");
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let engine = engine_with(&[("page", "{{ a }}-{{ b }}")]);
        let mut ctx = Context::new();
        ctx.insert("a", "1");
        ctx.insert("b", "2");
        let first = engine.render("page", &ctx).unwrap();
        let second = engine.render("page", &ctx).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "1-2");
    }

    #[test]
    fn test_leftover_markers_stripped() {
        let mut ctx = Context::new();
        ctx.insert("x", "{{ sneaky }} and {% also %} this");
        assert_eq!(
            render_one("a {{ x }} b", &ctx).unwrap(),
            "a  and  this b"
        );
    }

    #[test]
    fn test_unclosed_tag_is_syntax_error() {
        let ctx = Context::new();
        assert!(matches!(
            render_one("hello {{ world", &ctx),
            Err(Error::Syntax { .. })
        ));
    }

    #[test]
    fn test_unknown_directive_is_syntax_error() {
        let ctx = Context::new();
        assert!(matches!(
            render_one("{% frobnicate %}", &ctx),
            Err(Error::Syntax { .. })
        ));
    }

    #[test]
    fn test_missing_template_is_load_error() {
        let engine = Engine::new("/nonexistent");
        assert!(matches!(
            engine.render("ghost", &Context::new()),
            Err(Error::Load { .. })
        ));
    }

    #[test]
    fn test_invalidate_clears_cache() {
        use std::io::Write;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"one")
            .unwrap();

        let engine = Engine::new(dir.path());
        let ctx = Context::new();
        assert_eq!(engine.render("page", &ctx).unwrap(), "one");

        std::fs::write(&path, "two").unwrap();
        // Cached until invalidated.
        assert_eq!(engine.render("page", &ctx).unwrap(), "one");
        engine.invalidate();
        assert_eq!(engine.render("page", &ctx).unwrap(), "two");
    }
}
