//! Top-level module syntax.
//!
//! Modules are parsed with oxc; only the top-level imports and exports the
//! marker transform and the inline bundler care about are kept, as owned data
//! with byte spans into the original source.

use crate::error::{DiwuError, Result};
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    BindingPatternKind, Declaration, Expression, ImportDeclaration, ImportDeclarationSpecifier,
    Statement, VariableDeclarator,
};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};
use std::ops::Range;
use std::path::Path;

/// `imported as local` inside an import clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpecifier {
    pub imported: String,
    pub local: String,
}

/// One `import ... from "source"` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    pub source: String,
    pub default: Option<String>,
    pub namespace: Option<String>,
    /// Runtime named specifiers; `{type X}` entries are left out.
    pub specifiers: Vec<ImportSpecifier>,
    /// `import type { .. }` never binds runtime values.
    pub type_only: bool,
    /// Byte range of the whole statement, including a trailing `;`.
    pub span: Range<usize>,
}

/// One declarator of `export const a = .., b = ..`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declarator {
    /// `None` for destructuring patterns.
    pub name: Option<String>,
    /// Callee when the initializer is a direct call of an identifier.
    pub callee: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportKind {
    /// `export const|let|var ...`
    Variable(Vec<Declarator>),
    /// `export default ...`
    Default,
    /// `export { a, b as c }`
    List,
    /// `export { .. } from "x"` and `export * from "x"`
    ReExport { source: String },
    /// `export function`, `export class` and friends.
    Declaration,
}

/// One `export` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDecl {
    pub kind: ExportKind,
    /// From `export` up to the exported declaration or expression.
    pub keyword_span: Range<usize>,
    /// Whole statement.
    pub span: Range<usize>,
}

/// Imports and exports of one module, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSyntax {
    pub imports: Vec<ImportDecl>,
    pub exports: Vec<ExportDecl>,
}

impl ModuleSyntax {
    /// Parse `source`, picking JS/TS/JSX from the extension of `module_id`.
    pub fn parse(module_id: &str, source: &str) -> Result<Self> {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, source_type(module_id)).parse();

        if !ret.errors.is_empty() {
            let messages: Vec<String> = ret.errors.iter().map(|e| e.to_string()).collect();
            return Err(DiwuError::Parse {
                module_id: module_id.to_string(),
                message: messages.join("; "),
            });
        }

        let mut module = ModuleSyntax::default();
        for stmt in &ret.program.body {
            match stmt {
                Statement::ImportDeclaration(import) => module.imports.push(import_decl(import)),
                Statement::ExportNamedDeclaration(export) => {
                    let kind = match (&export.declaration, &export.source) {
                        (Some(Declaration::VariableDeclaration(var)), _) => {
                            ExportKind::Variable(var.declarations.iter().map(declarator).collect())
                        }
                        (Some(_), _) => ExportKind::Declaration,
                        (None, Some(source)) => ExportKind::ReExport {
                            source: source.value.to_string(),
                        },
                        (None, None) => ExportKind::List,
                    };
                    let keyword_end = export
                        .declaration
                        .as_ref()
                        .map_or(export.span.end, |decl| decl.span().start);
                    module.exports.push(ExportDecl {
                        kind,
                        keyword_span: export.span.start as usize..keyword_end as usize,
                        span: range(export.span),
                    });
                }
                Statement::ExportDefaultDeclaration(export) => {
                    module.exports.push(ExportDecl {
                        kind: ExportKind::Default,
                        keyword_span: export.span.start as usize
                            ..export.declaration.span().start as usize,
                        span: range(export.span),
                    });
                }
                Statement::ExportAllDeclaration(export) => {
                    module.exports.push(ExportDecl {
                        kind: ExportKind::ReExport {
                            source: export.source.value.to_string(),
                        },
                        keyword_span: range(export.span),
                        span: range(export.span),
                    });
                }
                _ => {}
            }
        }
        Ok(module)
    }
}

/// Source type from the module path; unknown extensions parse as JSX modules.
fn source_type(module_id: &str) -> SourceType {
    SourceType::from_path(Path::new(module_id))
        .unwrap_or_else(|_| SourceType::default().with_jsx(true))
        .with_module(true)
}

fn range(span: Span) -> Range<usize> {
    span.start as usize..span.end as usize
}

fn import_decl(import: &ImportDeclaration<'_>) -> ImportDecl {
    let mut decl = ImportDecl {
        source: import.source.value.to_string(),
        default: None,
        namespace: None,
        specifiers: Vec::new(),
        type_only: import.import_kind.is_type(),
        span: range(import.span),
    };

    for spec in import.specifiers.iter().flatten() {
        match spec {
            ImportDeclarationSpecifier::ImportSpecifier(s) => {
                if s.import_kind.is_type() {
                    continue;
                }
                decl.specifiers.push(ImportSpecifier {
                    imported: s.imported.name().to_string(),
                    local: s.local.name.to_string(),
                });
            }
            ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                decl.default = Some(s.local.name.to_string());
            }
            ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                decl.namespace = Some(s.local.name.to_string());
            }
        }
    }
    decl
}

fn declarator(decl: &VariableDeclarator<'_>) -> Declarator {
    let name = match &decl.id.kind {
        BindingPatternKind::BindingIdentifier(ident) => Some(ident.name.to_string()),
        _ => None,
    };
    let callee = match &decl.init {
        Some(Expression::CallExpression(call)) => match &call.callee {
            Expression::Identifier(ident) => Some(ident.name.to_string()),
            _ => None,
        },
        _ => None,
    };
    Declarator { name, callee }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ModuleSyntax {
        ModuleSyntax::parse("test.ts", source).unwrap()
    }

    fn bindings(module: &ModuleSyntax) -> Vec<(String, Option<String>)> {
        module
            .exports
            .iter()
            .filter_map(|export| match &export.kind {
                ExportKind::Variable(declarators) => Some(declarators),
                _ => None,
            })
            .flatten()
            .filter_map(|d| Some((d.name.clone()?, d.callee.clone())))
            .collect()
    }

    #[test]
    fn test_named_import_with_alias() {
        let module = parse(r#"import {diwuFn as fn, diwuHook} from "diwu";"#);
        assert_eq!(module.imports.len(), 1);
        let import = &module.imports[0];
        assert_eq!(import.source, "diwu");
        assert_eq!(
            import.specifiers,
            vec![
                ImportSpecifier {
                    imported: "diwuFn".into(),
                    local: "fn".into()
                },
                ImportSpecifier {
                    imported: "diwuHook".into(),
                    local: "diwuHook".into()
                },
            ]
        );
    }

    #[test]
    fn test_import_shapes() {
        let module = parse(
            r#"
import React, {useState} from 'react';
import * as fs from "fs";
import "./side-effect.css";
import type {Props} from "./types";
import {type Row, diwuFn} from "diwu";
const lazy = import("./lazy");
"#,
        );
        assert_eq!(module.imports.len(), 5);
        assert_eq!(module.imports[0].default.as_deref(), Some("React"));
        assert_eq!(module.imports[1].namespace.as_deref(), Some("fs"));
        assert_eq!(module.imports[2].source, "./side-effect.css");
        assert!(module.imports[3].type_only);
        assert_eq!(module.imports[4].specifiers.len(), 1);
        assert_eq!(module.imports[4].specifiers[0].imported, "diwuFn");
    }

    #[test]
    fn test_import_span_covers_semicolon() {
        let source = "import {a} from \"x\";\nconst b = 1;";
        let module = parse(source);
        assert_eq!(
            &source[module.imports[0].span.clone()],
            "import {a} from \"x\";"
        );
    }

    #[test]
    fn test_exported_call_initializers() {
        let module = parse(
            r#"
export const getUser = diwuFn(async (id) => ({id, name: "x"}));
export const count: number = 3, useTotal = diwuHook<number>(() => 42);
export let notCall = diwuFn;
export const chained = diwuFn(() => 1).bind(null);
const hidden = diwuFn(() => 2);
export function plain() {}
"#,
        );
        assert_eq!(
            bindings(&module),
            vec![
                ("getUser".to_string(), Some("diwuFn".to_string())),
                ("count".to_string(), None),
                ("useTotal".to_string(), Some("diwuHook".to_string())),
                ("notCall".to_string(), None),
                ("chained".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_exports_without_semicolons() {
        let module = parse("export const a = diwuFn(() => 1)\nexport const b = diwuFn(() => 2)\n");
        let names: Vec<_> = bindings(&module).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_tsx_module() {
        let source = r#"import {diwuFn, diwuHook} from "diwu";

export const getCard = diwuFn(async (id: string) => {
  return <div className="card">User {id}</div>;
});

export const useNote = diwuHook(() => <p>Don't panic</p>);
"#;
        let module = ModuleSyntax::parse("/src/Card.tsx", source).unwrap();
        assert_eq!(
            bindings(&module),
            vec![
                ("getCard".to_string(), Some("diwuFn".to_string())),
                ("useNote".to_string(), Some("diwuHook".to_string())),
            ]
        );
    }

    #[test]
    fn test_jsx_in_plain_js() {
        let source = "import {diwuFn} from 'diwu';\nexport const a = diwuFn(() => <b>it's</b>);\n";
        let module = ModuleSyntax::parse("/src/a.jsx", source).unwrap();
        assert_eq!(bindings(&module).len(), 1);
    }

    #[test]
    fn test_nested_exports_are_not_top_level() {
        let module = parse("function f() { const x = { export: 1 }; return x.export; }");
        assert!(module.exports.is_empty());
    }

    #[test]
    fn test_export_lists_and_reexports() {
        let source = concat!(
            "export { a, b as c };\n",
            "export * from \"./all\";\n",
            "export default 42;\n",
            "const a = 1, b = 2;",
        );
        let module = parse(source);
        assert_eq!(module.exports[0].kind, ExportKind::List);
        assert_eq!(
            module.exports[1].kind,
            ExportKind::ReExport {
                source: "./all".into()
            }
        );
        assert_eq!(module.exports[2].kind, ExportKind::Default);
        assert_eq!(&source[module.exports[2].keyword_span.clone()], "export default ");
    }

    #[test]
    fn test_parse_error_reports_module() {
        let err = ModuleSyntax::parse("broken.ts", "const a = 'x").unwrap_err();
        assert!(err.to_string().contains("broken.ts"));
    }
}
