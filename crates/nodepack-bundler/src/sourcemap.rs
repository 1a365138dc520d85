//! Source map helpers on top of `oxc_sourcemap`.
//!
//! The finalizer only ever shifts a map down (shebang restoration) or
//! remaps the minifier's output through the engine's map.

use oxc_sourcemap::{ConcatSourceMapBuilder, JSONSourceMap, SourceMapBuilder};
use rustc_hash::FxHashMap;

pub use oxc_sourcemap::SourceMap;

/// Parse a v3 source map document.
pub fn parse(bytes: &[u8]) -> Result<SourceMap, oxc_sourcemap::Error> {
    let json: JSONSourceMap = serde_json::from_slice(bytes)?;
    SourceMap::from_json(json)
}

/// The VLQ `mappings` string of `map`.
pub fn mappings(map: &SourceMap) -> String {
    map.to_json().mappings
}

/// Shift every mapping down by `lines` generated lines.
pub fn offset_lines(map: &SourceMap, lines: u32) -> SourceMap {
    let mut shifted = ConcatSourceMapBuilder::from_sourcemaps(&[(map, lines)]).into_sourcemap();
    if let Some(file) = map.get_file() {
        shifted.set_file(file);
    }
    shifted
}

/// Trace `generated` (which maps into the code `input` describes) back to
/// `input`'s original sources.
///
/// Segments whose position has no counterpart in `input` are dropped.
pub fn compose(generated: &SourceMap, input: &SourceMap) -> SourceMap {
    let lookup = input.generate_lookup_table();
    let mut builder = SourceMapBuilder::default();
    // input source id -> composed source id
    let mut source_ids = FxHashMap::default();
    let mut contents = Vec::new();

    for token in generated.get_tokens() {
        if token.get_source_id().is_none() {
            continue;
        }
        let Some(original) =
            input.lookup_source_view_token(&lookup, token.get_src_line(), token.get_src_col())
        else {
            continue;
        };
        let (Some(input_id), Some(source)) = (original.get_source_id(), original.get_source())
        else {
            continue;
        };

        let source_id = *source_ids.entry(input_id).or_insert_with(|| {
            let content = original.get_source_content();
            contents.push(content.map(|c| c.to_string()));
            builder.add_source_and_content(source, content.map_or("", |c| &**c))
        });
        let name = original
            .get_name()
            .or_else(|| token.get_name_id().and_then(|id| generated.get_name(id)))
            .map(|name| builder.add_name(name));

        builder.add_token(
            token.get_dst_line(),
            token.get_dst_col(),
            original.get_src_line(),
            original.get_src_col(),
            Some(source_id),
            name,
        );
    }

    if let Some(file) = generated.get_file() {
        builder.set_file(file);
    }
    let mut composed = builder.into_sourcemap();
    composed.set_source_contents(contents.iter().map(|c| c.as_deref()).collect());
    composed
}
