//! Minifier seam.

use crate::sourcemap::SourceMap;

/// Options the finalizer always minifies with.
#[derive(Debug, Clone)]
pub struct MinifyOptions<'a> {
    /// Output name, used for the map's `file` field.
    pub filename: &'a str,
    pub compress: bool,
    pub keep_classnames: bool,
    pub keep_fnames: bool,
    /// Whether the caller wants a map back.
    pub source_map: bool,
    /// Map of the code being minified. The returned map is traced back
    /// through it to the original sources.
    pub input_map: Option<&'a SourceMap>,
}

impl<'a> MinifyOptions<'a> {
    /// Mangle-only settings: no compression, class and function names kept.
    pub fn mangle_only(filename: &'a str) -> Self {
        Self {
            filename,
            compress: false,
            keep_classnames: true,
            keep_fnames: true,
            source_map: false,
            input_map: None,
        }
    }

    pub fn with_source_map(mut self, input_map: Option<&'a SourceMap>) -> Self {
        self.source_map = true;
        self.input_map = input_map;
        self
    }
}

/// What a minifier produced. `code: None` means "no result"; the finalizer
/// then keeps the unminified code and map.
#[derive(Debug, Clone, Default)]
pub struct MinifyOutput {
    pub code: Option<String>,
    pub map: Option<SourceMap>,
}

impl MinifyOutput {
    pub fn declined() -> Self {
        Self::default()
    }
}

pub trait Minifier: Send + Sync + std::fmt::Debug {
    /// Minify `code`. Failures are reported as [`MinifyOutput::declined`],
    /// never as errors.
    fn minify(&self, code: &str, options: &MinifyOptions<'_>) -> MinifyOutput;
}

#[cfg(feature = "oxc")]
pub use oxc::OxcMinifier;

#[cfg(feature = "oxc")]
mod oxc {
    use oxc_allocator::Allocator;
    use oxc_codegen::{Codegen, CodegenOptions};
    use oxc_minifier::{MangleOptions, MangleOptionsKeepNames, MinifierOptions};
    use oxc_parser::Parser;
    use oxc_span::SourceType;
    use std::path::PathBuf;

    use super::{Minifier, MinifyOptions, MinifyOutput};
    use crate::sourcemap;

    /// oxc-backed [`Minifier`].
    #[derive(Debug, Clone, Copy, Default)]
    pub struct OxcMinifier;

    impl OxcMinifier {
        pub fn new() -> Self {
            Self
        }
    }

    impl Minifier for OxcMinifier {
        fn minify(&self, code: &str, options: &MinifyOptions<'_>) -> MinifyOutput {
            let allocator = Allocator::default();
            let parsed = Parser::new(&allocator, code, SourceType::cjs()).parse();
            if parsed.panicked || !parsed.errors.is_empty() {
                tracing::debug!(
                    "skipping oxc minification: {} parse error(s)",
                    parsed.errors.len()
                );
                return MinifyOutput::declined();
            }
            let mut program = parsed.program;

            let minifier_options = MinifierOptions {
                mangle: Some(MangleOptions {
                    keep_names: MangleOptionsKeepNames {
                        function: options.keep_fnames,
                        class: options.keep_classnames,
                    },
                    ..MangleOptions::default()
                }),
                compress: None,
            };
            let minified =
                oxc_minifier::Minifier::new(minifier_options).minify(&allocator, &mut program);

            let codegen_options = CodegenOptions {
                source_map_path: options
                    .source_map
                    .then(|| PathBuf::from(options.filename)),
                ..CodegenOptions::minify()
            };
            let generated = Codegen::new()
                .with_options(codegen_options)
                .with_scoping(minified.scoping)
                .build(&program);

            let map = match (generated.map, options.input_map) {
                (Some(map), Some(input)) => Some(sourcemap::compose(&map, input)),
                (map, _) => map,
            };

            MinifyOutput {
                code: Some(generated.code),
                map,
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_keeps_function_names() {
            let code = "function namedThing(longArgument) { return longArgument + 1; }\nmodule.exports = namedThing;\n";
            let output = OxcMinifier::new().minify(code, &MinifyOptions::mangle_only("index.js"));

            let minified = output.code.expect("minified code");
            assert!(minified.contains("namedThing"));
            assert!(minified.len() < code.len());
        }

        #[test]
        fn test_parse_error_declines() {
            let output =
                OxcMinifier::new().minify("function (", &MinifyOptions::mangle_only("index.js"));
            assert!(output.code.is_none());
            assert!(output.map.is_none());
        }

        #[test]
        fn test_maps_back_through_input_map() {
            let code = "function namedThing(longArgument) {\n  return longArgument + 1;\n}\nmodule.exports = namedThing;\n";
            let input = sourcemap::parse(
                br#"{"version":3,"sources":["src/thing.ts"],"names":[],"mappings":"AAAA;AACA;AACA;AACA"}"#,
            )
            .unwrap();

            let output = OxcMinifier::new().minify(
                code,
                &MinifyOptions::mangle_only("index.js").with_source_map(Some(&input)),
            );

            let minified = output.code.expect("minified code");
            assert!(minified.len() < code.len());
            let map = output.map.expect("composed map");
            let sources: Vec<&str> = map.get_sources().map(|s| &**s).collect();
            assert_eq!(sources, vec!["src/thing.ts"]);
            assert!(map.get_tokens().count() > 0);
        }

        #[test]
        fn test_map_without_input_points_at_bundle() {
            let code = "function namedThing(a) { return a; }\n";
            let output = OxcMinifier::new().minify(
                code,
                &MinifyOptions::mangle_only("index.js").with_source_map(None),
            );

            let map = output.map.expect("codegen map");
            let sources: Vec<&str> = map.get_sources().map(|s| &**s).collect();
            assert_eq!(sources, vec!["index.js"]);
        }
    }
}
