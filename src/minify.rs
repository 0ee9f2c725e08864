//! Asset minification for JS and CSS sources.
//!
//! The pipeline treats the minifier as a pluggable collaborator behind the
//! [`Minify`] trait; [`DefaultMinifier`] uses oxc for JavaScript and
//! lightningcss for CSS. A failed minification is an error the pipeline
//! recovers from, never a panic.

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;

use crate::error::MinifyError;
use crate::kind::AssetKind;

/// External minifier contract: pure text-to-text transforms.
pub trait Minify {
    fn minify_css(&self, source: &str) -> Result<String, MinifyError>;
    fn minify_js(&self, source: &str) -> Result<String, MinifyError>;

    /// Dispatch on asset kind.
    fn minify(&self, kind: AssetKind, source: &str) -> Result<String, MinifyError> {
        match kind {
            AssetKind::Css => self.minify_css(source),
            AssetKind::Js => self.minify_js(source),
        }
    }
}

/// Default implementation: oxc (JS) + lightningcss (CSS).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMinifier;

impl Minify for DefaultMinifier {
    fn minify_css(&self, source: &str) -> Result<String, MinifyError> {
        let stylesheet = StyleSheet::parse(source, ParserOptions::default())
            .map_err(|e| MinifyError(e.to_string()))?;
        let result = stylesheet
            .to_css(PrinterOptions {
                minify: true,
                ..PrinterOptions::default()
            })
            .map_err(|e| MinifyError(e.to_string()))?;
        Ok(result.code)
    }

    fn minify_js(&self, source: &str) -> Result<String, MinifyError> {
        let allocator = Allocator::default();
        let source_type = SourceType::mjs();
        let ret = Parser::new(&allocator, source, source_type).parse();
        if !ret.errors.is_empty() {
            let messages: Vec<String> = ret.errors.iter().map(|e| e.to_string()).collect();
            return Err(MinifyError(messages.join("; ")));
        }
        let mut program = ret.program;
        let options = MinifierOptions {
            mangle: Some(MangleOptions::default()),
            compress: Some(CompressOptions::smallest()),
        };
        let ret = Minifier::new(options).minify(&allocator, &mut program);
        let code = Codegen::new()
            .with_options(CodegenOptions {
                minify: true,
                comments: CommentOptions::disabled(),
                ..CodegenOptions::default()
            })
            .with_scoping(ret.scoping)
            .build(&program)
            .code;
        Ok(code)
    }
}
