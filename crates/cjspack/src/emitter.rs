//! Bundle emitter: serializes a [`BundlePlan`] into a single script
//!
//! The artifact is one immediately invoked function expression. Its only
//! argument is the module table, an object literal mapping each canonical key
//! to `[factory, specifierMap]`. The function body is the fixed runtime below,
//! followed by a `require` of the entry key; the IIFE evaluates to the entry
//! module's exports.

use log::{debug, info};

use crate::{bundle_plan::BundlePlan, error::Result, module_graph::ModuleGraph};

/// Loader runtime, identical for every bundle.
///
/// Modules are cached by key and the cache entry is created before the
/// factory runs, so each module is evaluated once and an import cycle sees
/// the partially populated `exports` of the module still running. A factory
/// that throws is evicted from the cache.
pub const RUNTIME_PREAMBLE: &str = r#"(function (modules) {
  var cache = {};
  var has = Object.prototype.hasOwnProperty;
  function require(path) {
    if (has.call(cache, path)) {
      return cache[path].exports;
    }
    if (!has.call(modules, path)) {
      throw new Error("cjspack: module '" + path + "' is not part of this bundle");
    }
    var factory = modules[path][0];
    var mapping = modules[path][1];
    var module = { exports: {} };
    cache[path] = module;
    var threw = true;
    try {
      factory(function (specifier) {
        if (!has.call(mapping, specifier)) {
          throw new Error("cjspack: cannot find '" + specifier + "' from '" + path + "'");
        }
        return require(mapping[specifier]);
      }, module, module.exports);
      threw = false;
    } finally {
      if (threw) {
        delete cache[path];
      }
    }
    return module.exports;
  }
"#;

/// Emit the artifact for a closed module graph.
pub fn emit(graph: &ModuleGraph) -> Result<String> {
    let plan = BundlePlan::from_graph(graph)?;
    let artifact = render(&plan);
    info!(
        "Emitted bundle: {} module(s), {} bytes",
        plan.factories.len(),
        artifact.len()
    );
    Ok(artifact)
}

/// Serialize a plan. Every key and specifier goes through
/// [`quote_js_string`]; module bodies are embedded verbatim.
pub fn render(plan: &BundlePlan) -> String {
    let body_len: usize = plan.factories.iter().map(|f| f.body.len()).sum();
    let mut out = String::with_capacity(RUNTIME_PREAMBLE.len() + body_len + 256);

    out.push_str(RUNTIME_PREAMBLE);
    out.push_str("  return require(");
    out.push_str(&quote_js_string(plan.entry.as_str()));
    out.push_str(");\n})({\n");

    for (index, factory) in plan.factories.iter().enumerate() {
        debug!("Emitting factory for {}", factory.path);
        if index > 0 {
            out.push_str(",\n");
        }
        out.push_str(&quote_js_string(factory.path.as_str()));
        out.push_str(": [function (require, module, exports) {\n");
        out.push_str(&factory.body);
        // A trailing line comment must not swallow the closing brace
        if !factory.body.is_empty() && !factory.body.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("}, {");
        for (i, (specifier, key)) in factory.dependency_map.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&quote_js_string(specifier));
            out.push_str(": ");
            out.push_str(&quote_js_string(key.as_str()));
        }
        out.push_str("}]");
    }

    out.push_str("\n});\n");
    out
}

/// Quote `value` as a double-quoted JavaScript string literal.
pub fn quote_js_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            // Line terminators inside string literals are a syntax error in ES5
            '\u{2028}' => quoted.push_str("\\u2028"),
            '\u{2029}' => quoted.push_str("\\u2029"),
            c if c.is_control() => quoted.push_str(&format!("\\u{:04x}", u32::from(c))),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
