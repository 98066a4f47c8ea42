//! Built-in analyzer for ES module sources
//!
//! Files are parsed with oxc and rewritten by splicing the original text, so
//! everything outside module syntax is kept byte for byte. Import and
//! re-export `require`s are hoisted above the module code, and every use of an
//! imported binding becomes a property read on the required module. Bindings
//! therefore stay live: a cycle reads whatever the other module has
//! initialized so far, and later reassignments in the exporter are visible.

use std::path::Path;

use log::trace;
use once_cell::sync::Lazy;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, BindingIdentifier, CallExpression, Declaration, ExportAllDeclaration,
    ExportDefaultDeclaration, ExportDefaultDeclarationKind, ExportNamedDeclaration, Expression,
    IdentifierReference, ImportDeclaration, ImportDeclarationSpecifier, ModuleExportName,
    ObjectProperty, Program, Statement,
};
use oxc_ast_visit::{Visit, walk};
use oxc_parser::Parser;
use oxc_semantic::{Scoping, SemanticBuilder, SymbolId};
use oxc_span::{GetSpan, SourceType, Span};
use regex::Regex;
use rustc_hash::FxHashMap;

use super::{Analysis, SourceAnalyzer};
use crate::{
    emitter::quote_js_string,
    error::{BundleError, Result},
    resolver::is_path_specifier,
    types::FxIndexMap,
};

/// Export names that can follow a `.` in a member expression
static IDENTIFIER_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{L}_$][\p{L}\p{N}_$]*$").expect("valid identifier pattern"));

/// Analyzer for files written with static `import`/`export` statements
#[derive(Debug, Clone, Copy, Default)]
pub struct EsmAnalyzer;

impl EsmAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl SourceAnalyzer for EsmAnalyzer {
    fn analyze(&self, source: &str, path: &Path) -> Result<Analysis> {
        let allocator = Allocator::default();
        let parsed = Parser::new(&allocator, source, source_type(path)).parse();
        if let Some(error) = parsed.errors.first() {
            return Err(BundleError::analysis(path, format!("syntax error: {error}")));
        }
        if parsed.panicked {
            return Err(BundleError::analysis(path, "syntax error"));
        }

        let program = parsed.program;
        let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();

        let mut rewriter = ModuleRewriter::new(source, path, scoping);
        rewriter.collect_requests(&program)?;
        rewriter.collect_exports(&program)?;
        rewriter.rewrite_references(&program);

        let statements = rewriter.module_statements;
        let analysis = rewriter.finish();
        trace!(
            "Analyzed {}: {statements} module statement(s), dependencies {:?}",
            path.display(),
            analysis.dependency_specifiers
        );
        Ok(analysis)
    }
}

/// `.cjs` files are scripts; everything else is parsed as a module
fn source_type(path: &Path) -> SourceType {
    let is_commonjs = path.extension().is_some_and(|ext| ext == "cjs");
    SourceType::mjs().with_module(!is_commonjs)
}

/// Replace `start..end` of the source with `text`
#[derive(Debug)]
struct Edit {
    start: u32,
    end: u32,
    text: String,
}

/// Per-file rewriting state
struct ModuleRewriter<'s> {
    source: &'s str,
    path: &'s Path,
    scoping: Scoping,
    /// Hoisted `require`s, in source order
    header: String,
    edits: Vec<Edit>,
    /// Local import binding to the expression that reads it
    imports: FxHashMap<SymbolId, String>,
    /// Exported name to the expression backing it. `None` marks a name
    /// assigned directly (`export default <expr>`).
    exports: FxIndexMap<String, Option<String>>,
    /// (source offset, specifier) so that imports and `require` calls can be
    /// merged back into source order
    dependencies: Vec<(u32, String)>,
    module_statements: usize,
    temp_count: usize,
}

impl<'s> ModuleRewriter<'s> {
    fn new(source: &'s str, path: &'s Path, scoping: Scoping) -> Self {
        Self {
            source,
            path,
            scoping,
            header: String::new(),
            edits: Vec::new(),
            imports: FxHashMap::default(),
            exports: FxIndexMap::default(),
            dependencies: Vec::new(),
            module_statements: 0,
            temp_count: 0,
        }
    }

    /// Statements that load another module, in source order. This runs before
    /// local exports so that every import binding is known wherever the
    /// import statement sits.
    fn collect_requests(&mut self, program: &Program<'_>) -> Result<()> {
        if let Some(hashbang) = &program.hashbang {
            self.remove(hashbang.span);
        }
        for statement in &program.body {
            match statement {
                Statement::ImportDeclaration(decl) => self.import(decl),
                Statement::ExportNamedDeclaration(decl) if decl.source.is_some() => {
                    self.export_named(decl)?;
                }
                Statement::ExportAllDeclaration(decl) => self.export_all(decl)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn collect_exports(&mut self, program: &Program<'_>) -> Result<()> {
        for statement in &program.body {
            match statement {
                Statement::ExportNamedDeclaration(decl) if decl.source.is_none() => {
                    self.export_named(decl)?;
                }
                Statement::ExportDefaultDeclaration(decl) => self.export_default(decl)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Walk the code that survives the rewrite
    fn rewrite_references(&mut self, program: &Program<'_>) {
        for statement in &program.body {
            match statement {
                Statement::ImportDeclaration(_) | Statement::ExportAllDeclaration(_) => {}
                Statement::ExportNamedDeclaration(decl) => {
                    if let Some(declaration) = &decl.declaration {
                        self.visit_declaration(declaration);
                    }
                }
                Statement::ExportDefaultDeclaration(decl) => {
                    self.visit_export_default_declaration_kind(&decl.declaration);
                }
                other => self.visit_statement(other),
            }
        }
    }

    fn import(&mut self, decl: &ImportDeclaration<'_>) {
        self.module_statements += 1;
        let temp = self.require_temp(decl.source.value.as_str(), decl.span.start);
        self.remove(decl.span);

        let Some(specifiers) = &decl.specifiers else {
            return;
        };
        for specifier in specifiers {
            let (local, expression) = match specifier {
                ImportDeclarationSpecifier::ImportSpecifier(named) => {
                    (&named.local, member(&temp, named.imported.name().as_str()))
                }
                ImportDeclarationSpecifier::ImportDefaultSpecifier(default) => (
                    &default.local,
                    format!("({temp}.__esModule ? {temp}.default : {temp})"),
                ),
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(namespace) => {
                    (&namespace.local, temp.clone())
                }
            };
            self.imports.insert(local.symbol_id(), expression);
        }
    }

    fn export_named(&mut self, decl: &ExportNamedDeclaration<'_>) -> Result<()> {
        self.module_statements += 1;

        if let Some(source) = &decl.source {
            let temp = self.require_temp(source.value.as_str(), decl.span.start);
            for specifier in &decl.specifiers {
                let expression = member(&temp, specifier.local.name().as_str());
                self.export(specifier.exported.name().as_str(), Some(expression))?;
            }
            self.remove(decl.span);
        } else if let Some(declaration) = &decl.declaration {
            for name in declared_names(declaration) {
                self.export(&name, Some(name.clone()))?;
            }
            self.edit(decl.span.start, declaration.span().start, "");
        } else {
            for specifier in &decl.specifiers {
                let local = specifier.local.name().to_string();
                let expression = match &specifier.local {
                    ModuleExportName::IdentifierReference(ident) => {
                        self.import_expression(ident).unwrap_or(local)
                    }
                    _ => local,
                };
                self.export(specifier.exported.name().as_str(), Some(expression))?;
            }
            self.remove(decl.span);
        }
        Ok(())
    }

    fn export_default(&mut self, decl: &ExportDefaultDeclaration<'_>) -> Result<()> {
        self.module_statements += 1;
        let body_start = decl.declaration.span().start;
        let name = match &decl.declaration {
            ExportDefaultDeclarationKind::FunctionDeclaration(function) => function.id.as_ref(),
            ExportDefaultDeclarationKind::ClassDeclaration(class) => class.id.as_ref(),
            _ => None,
        };

        if let Some(id) = name {
            self.export("default", Some(id.name.to_string()))?;
            self.edit(decl.span.start, body_start, "");
        } else {
            self.export("default", None)?;
            self.edit(decl.span.start, body_start, "exports.default = ");
            if !self.source[..decl.span.end as usize].ends_with(';') {
                self.edit(decl.span.end, decl.span.end, ";");
            }
        }
        Ok(())
    }

    fn export_all(&mut self, decl: &ExportAllDeclaration<'_>) -> Result<()> {
        self.module_statements += 1;
        let temp = self.require_temp(decl.source.value.as_str(), decl.span.start);
        self.remove(decl.span);

        match &decl.exported {
            Some(name) => self.export(name.name().as_str(), Some(temp))?,
            None => self.header.push_str(&format!(
                "Object.keys({temp}).forEach(function (key) {{ if (key === \"default\" || key === \
                 \"__esModule\" || Object.prototype.hasOwnProperty.call(exports, key)) return; \
                 Object.defineProperty(exports, key, {{ enumerable: true, get: function () {{ \
                 return {temp}[key]; }} }}); }});\n"
            )),
        }
        Ok(())
    }

    /// Hoist a `require` for `spec` and return the temporary holding its exports
    fn require_temp(&mut self, spec: &str, offset: u32) -> String {
        self.dependencies.push((offset, spec.to_owned()));
        let temp = format!("__cjspack_import_{}", self.temp_count);
        self.temp_count += 1;
        self.header.push_str(&format!(
            "var {temp} = require({});\n",
            quote_js_string(spec)
        ));
        temp
    }

    fn export(&mut self, name: &str, local: Option<String>) -> Result<()> {
        if self.exports.contains_key(name) {
            return Err(BundleError::analysis(
                self.path,
                format!("duplicate export '{name}'"),
            ));
        }
        self.exports.insert(name.to_owned(), local);
        Ok(())
    }

    /// The read expression for `ident` if it refers to an import binding
    fn import_expression(&self, ident: &IdentifierReference<'_>) -> Option<String> {
        let symbol = self.scoping.get_reference(ident.reference_id()).symbol_id()?;
        self.imports.get(&symbol).cloned()
    }

    /// Record a path-like `require('./x')` whose `require` is not a local binding
    fn require_call(&mut self, callee: &IdentifierReference<'_>, call: &CallExpression<'_>) {
        if callee.name.as_str() != "require" || call.arguments.len() != 1 {
            return;
        }
        if self
            .scoping
            .get_reference(callee.reference_id())
            .symbol_id()
            .is_some()
        {
            return;
        }
        if let Some(Argument::StringLiteral(literal)) = call.arguments.first()
            && is_path_specifier(literal.value.as_str())
        {
            self.dependencies
                .push((call.span.start, literal.value.to_string()));
        }
    }

    fn edit(&mut self, start: u32, end: u32, text: &str) {
        self.edits.push(Edit {
            start,
            end,
            text: text.to_owned(),
        });
    }

    fn remove(&mut self, span: Span) {
        self.edit(span.start, span.end, "");
    }

    /// Strict mode, the interop marker and one getter per live export,
    /// followed by the hoisted requires
    fn prologue(&self) -> String {
        let mut prologue = String::from(
            "\"use strict\";\nObject.defineProperty(exports, \"__esModule\", { value: true });\n",
        );
        for (name, local) in &self.exports {
            if let Some(local) = local {
                prologue.push_str(&format!(
                    "Object.defineProperty(exports, {}, {{ enumerable: true, get: function () {{ \
                     return {local}; }} }});\n",
                    quote_js_string(name)
                ));
            }
        }
        prologue.push_str(&self.header);
        prologue
    }

    fn finish(mut self) -> Analysis {
        let mut body = if self.module_statements > 0 {
            self.prologue()
        } else {
            String::new()
        };

        self.edits.sort_by_key(|edit| (edit.start, edit.end));
        let mut cursor = 0;
        for edit in &self.edits {
            let start = edit.start as usize;
            if start < cursor {
                continue;
            }
            body.push_str(&self.source[cursor..start]);
            body.push_str(&edit.text);
            cursor = edit.end as usize;
        }
        body.push_str(&self.source[cursor..]);

        self.dependencies.sort_by_key(|(offset, _)| *offset);
        Analysis {
            dependency_specifiers: self.dependencies.into_iter().map(|(_, spec)| spec).collect(),
            body,
        }
    }
}

impl<'a> Visit<'a> for ModuleRewriter<'_> {
    fn visit_identifier_reference(&mut self, it: &IdentifierReference<'a>) {
        if let Some(expression) = self.import_expression(it) {
            self.edit(it.span.start, it.span.end, &expression);
        }
    }

    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        if let Expression::Identifier(callee) = &it.callee {
            // Calling through the module object must not pass it as `this`
            if let Some(expression) = self.import_expression(callee) {
                self.edit(callee.span.start, callee.span.end, &format!("(0, {expression})"));
                self.visit_arguments(&it.arguments);
                return;
            }
            self.require_call(callee, it);
        }
        walk::walk_call_expression(self, it);
    }

    fn visit_object_property(&mut self, it: &ObjectProperty<'a>) {
        if it.shorthand
            && let Expression::Identifier(ident) = &it.value
            && let Some(expression) = self.import_expression(ident)
        {
            self.edit(
                ident.span.start,
                ident.span.end,
                &format!("{}: {expression}", ident.name),
            );
            return;
        }
        walk::walk_object_property(self, it);
    }
}

/// `temp.name`, or `temp["name"]` when the name is not an identifier
fn member(temp: &str, name: &str) -> String {
    if IDENTIFIER_NAME.is_match(name) {
        format!("{temp}.{name}")
    } else {
        format!("{temp}[{}]", quote_js_string(name))
    }
}

/// Names bound by an exported declaration, destructuring included
fn declared_names(declaration: &Declaration<'_>) -> Vec<String> {
    match declaration {
        Declaration::VariableDeclaration(variables) => {
            let mut collector = BindingCollector::default();
            for declarator in &variables.declarations {
                collector.visit_binding_pattern(&declarator.id);
            }
            collector.names
        }
        Declaration::FunctionDeclaration(function) => binding_name(function.id.as_ref()),
        Declaration::ClassDeclaration(class) => binding_name(class.id.as_ref()),
        _ => Vec::new(),
    }
}

fn binding_name(id: Option<&BindingIdentifier<'_>>) -> Vec<String> {
    id.map(|id| id.name.to_string()).into_iter().collect()
}

/// Collects binding identifiers of a pattern without entering default values
#[derive(Default)]
struct BindingCollector {
    names: Vec<String>,
}

impl<'a> Visit<'a> for BindingCollector {
    fn visit_binding_identifier(&mut self, it: &BindingIdentifier<'a>) {
        self.names.push(it.name.to_string());
    }

    fn visit_expression(&mut self, _it: &Expression<'a>) {}
}
