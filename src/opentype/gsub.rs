//! `GSUB` single substitution lookup for half-width glyph forms.
//!
//! ARIB captions request half-width kana by drawing at half the em
//! width. Fonts express the half-width variants through the `hwid`
//! feature registered for the `kana` script and the `JAN ` language
//! system, so the renderer resolves the substitution itself from the
//! raw `GSUB` table.
//!
//! Parsing is defensive throughout: a malformed, truncated or simply
//! absent table yields an empty map, never an error. Offsets labelled
//! Offset16/Offset32 are relative to the base of the containing table.

use rustc_hash::FxHashMap;

use super::{Bytes, Tag};

/// Mapping from source glyph id to its substituted glyph id.
pub type SubstMap = FxHashMap<u16, u16>;

/// Extracts the single-substitution mapping for the given
/// feature/script/language-system triple from raw `GSUB` table bytes.
///
/// Only the first matching feature record is processed. Returns an
/// empty map when the script, language system or feature is absent, or
/// when any structural check fails.
pub fn single_subst_map(data: &[u8], feature: Tag, script: Tag, lang_sys: Tag) -> SubstMap {
    read_table(Bytes::new(data), feature, script, lang_sys).unwrap_or_default()
}

fn read_table(b: Bytes, feature: Tag, script: Tag, lang_sys: Tag) -> Option<SubstMap> {
    // GSUB Header:
    // uint16       majorVersion
    // uint16       minorVersion
    // Offset16     scriptListOffset
    // Offset16     featureListOffset
    // Offset16     lookupListOffset
    if !b.check_range(0, 10) {
        return None;
    }
    let script_list = b.read_offset16(4)?;
    let feature_list = b.read_offset16(6)?;
    let lookup_list = b.read_offset16(8)?;
    let feature_indices = script_feature_indices(b, script_list, script, lang_sys)?;

    // FeatureList table:
    // uint16           featureCount
    // FeatureRecord    featureRecords[featureCount]
    //
    // FeatureRecord:
    // Tag              featureTag
    // Offset16         featureOffset
    let feature_count = b.read_u16(feature_list)?;
    let lookup_count = b.read_u16(lookup_list)?;

    let mut map = SubstMap::default();
    for feature_index in feature_indices {
        if feature_index >= feature_count {
            return None;
        }
        let record = feature_list + 2 + feature_index as usize * 6;
        if b.read_u32(record)? != feature {
            continue;
        }
        // Feature table:
        // Offset16     featureParamsOffset
        // uint16       lookupIndexCount
        // uint16       lookupListIndices[lookupIndexCount]
        let feature_offset = feature_list + b.read_offset16(record + 4)?;
        if b.read_offset16(feature_offset)? != 0 {
            // FeatureParams tables are defined only for 'cv01'-'cv99',
            // 'size' and 'ss01'-'ss20'; one here means the table is not
            // what we were asked to read.
            return None;
        }
        let lookup_index_count = b.read_u16(feature_offset + 2)?;
        for i in 0..lookup_index_count as usize {
            let lookup_list_index = b.read_u16(feature_offset + 4 + i * 2)?;
            if lookup_list_index >= lookup_count {
                return None;
            }
            // LookupList table:
            // uint16       lookupCount
            // Offset16     lookupOffsets[lookupCount]
            let lookup_offset =
                lookup_list + b.read_offset16(lookup_list + 2 + lookup_list_index as usize * 2)?;
            read_lookup(b, lookup_offset, &mut map)?;
        }
        // Only the first matching feature record is honored.
        break;
    }
    Some(map)
}

/// Selects the LangSys for the requested script and collects its
/// feature indices: the required feature (when present) followed by the
/// listed feature indices.
fn script_feature_indices(
    b: Bytes,
    script_list: usize,
    script: Tag,
    lang_sys: Tag,
) -> Option<Vec<u16>> {
    // ScriptList table:
    // uint16           scriptCount
    // ScriptRecord     scriptRecords[scriptCount]
    //
    // ScriptRecord:
    // Tag              scriptTag
    // Offset16         scriptOffset
    let mut indices = Vec::new();
    let script_count = b.read_u16(script_list)?;
    for i in 0..script_count as usize {
        let record = script_list + 2 + i * 6;
        if b.read_u32(record)? != script {
            continue;
        }
        // Script table:
        // Offset16         defaultLangSysOffset
        // uint16           langSysCount
        // LangSysRecord    langSysRecords[langSysCount]
        let script_offset = script_list + b.read_offset16(record + 4)?;
        let mut selected = script_offset + b.read_offset16(script_offset)?;
        let lang_sys_count = b.read_u16(script_offset + 2)?;
        for j in 0..lang_sys_count as usize {
            let record = script_offset + 4 + j * 6;
            if b.read_u32(record)? == lang_sys {
                selected = script_offset + b.read_offset16(record + 4)?;
                break;
            }
        }
        if selected == script_offset {
            // Neither a default LangSys nor the requested one.
            continue;
        }
        // LangSys table:
        // Offset16     lookupOrderOffset
        // uint16       requiredFeatureIndex
        // uint16       featureIndexCount
        // uint16       featureIndices[featureIndexCount]
        let required = b.read_u16(selected + 2)?;
        if required != 0xffff {
            indices.push(required);
        }
        let count = b.read_u16(selected + 4)?;
        for k in 0..count as usize {
            indices.push(b.read_u16(selected + 6 + k * 2)?);
        }
        break;
    }
    Some(indices)
}

fn read_lookup(b: Bytes, lookup_offset: usize, map: &mut SubstMap) -> Option<()> {
    // Lookup table:
    // uint16       lookupType
    // uint16       lookupFlag
    // uint16       subTableCount
    // Offset16     subtableOffsets[subTableCount]
    let lookup_type = b.read_u16(lookup_offset)?;
    let subtable_count = b.read_u16(lookup_offset + 4)?;
    let is_extension = lookup_type == 7;
    for i in 0..subtable_count as usize {
        let mut subtable = lookup_offset + b.read_offset16(lookup_offset + 6 + i * 2)?;
        let mut kind = lookup_type;
        let mut format = b.read_u16(subtable)?;
        if is_extension {
            // Extension Substitution Subtable Format 1:
            // uint16       substFormat
            // uint16       extensionLookupType
            // Offset32     extensionOffset
            //
            // Rewrites (kind, subtable) once before dispatch; a nested
            // extension re-reads as type 7 below and falls through.
            if format != 1 {
                continue;
            }
            kind = b.read_u16(subtable + 2)?;
            subtable += b.read_offset32(subtable + 4)?;
            format = b.read_u16(subtable)?;
        }
        if kind == 1 {
            read_single_subst(b, subtable, format, map)?;
        }
    }
    Some(())
}

fn read_single_subst(b: Bytes, subtable: usize, format: u16, map: &mut SubstMap) -> Option<()> {
    let coverage_offset = subtable + b.read_offset16(subtable + 2)?;
    let coverage = read_coverage(b, coverage_offset)?;
    match format {
        1 => {
            // Single Substitution Format 1:
            // uint16   substFormat
            // Offset16 coverageOffset
            // int16    deltaGlyphID
            let delta = b.read_i16(subtable + 4)?;
            for glyph_id in coverage {
                map.insert(glyph_id, glyph_id.wrapping_add(delta as u16));
            }
        }
        2 => {
            // Single Substitution Format 2:
            // uint16   substFormat
            // Offset16 coverageOffset
            // uint16   glyphCount
            // uint16   substituteGlyphIDs[glyphCount]
            let glyph_count = b.read_u16(subtable + 4)? as usize;
            if coverage.len() < glyph_count {
                return None;
            }
            for (i, glyph_id) in coverage.iter().take(glyph_count).enumerate() {
                let substitute = b.read_u16(subtable + 6 + i * 2)?;
                map.insert(*glyph_id, substitute);
            }
        }
        _ => {}
    }
    Some(())
}

/// Expands a coverage table into the ordered list of covered glyph ids.
fn read_coverage(b: Bytes, offset: usize) -> Option<Vec<u16>> {
    let format = b.read_u16(offset)?;
    if format == 1 {
        // Coverage Format 1:
        // uint16       coverageFormat
        // uint16       glyphCount
        // uint16       glyphArray[glyphCount]
        let glyph_count = b.read_u16(offset + 2)?;
        let mut coverage = Vec::with_capacity(glyph_count as usize);
        for i in 0..glyph_count as usize {
            coverage.push(b.read_u16(offset + 4 + i * 2)?);
        }
        Some(coverage)
    } else if format == 2 {
        // Coverage Format 2:
        // uint16       coverageFormat
        // uint16       rangeCount
        // RangeRecord  rangeRecords[rangeCount]
        //
        // RangeRecord:
        // uint16       startGlyphID
        // uint16       endGlyphID
        // uint16       startCoverageIndex
        let range_count = b.read_u16(offset + 2)?;
        let mut coverage = Vec::new();
        let mut coverage_index = 0u32;
        for i in 0..range_count as usize {
            let record = offset + 4 + i * 6;
            let start = b.read_u16(record)?;
            let end = b.read_u16(record + 2)?;
            let start_coverage_index = b.read_u16(record + 4)?;
            if start > end || start_coverage_index as u32 != coverage_index {
                return None;
            }
            coverage_index += (end - start) as u32 + 1;
            for glyph_id in start..=end {
                coverage.push(glyph_id);
            }
        }
        Some(coverage)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opentype::{
        tag_from_bytes, FEATURE_HALF_WIDTH, LANG_SYS_JAPANESE, SCRIPT_KANA,
    };

    const HWID: Tag = FEATURE_HALF_WIDTH;
    const KANA: Tag = SCRIPT_KANA;
    const JAN: Tag = LANG_SYS_JAPANESE;

    /// Coverage table contents.
    enum Coverage {
        /// Format 1 glyph list.
        List(Vec<u16>),
        /// Format 2 range records (start, end, startCoverageIndex).
        Ranges(Vec<(u16, u16, u16)>),
        /// An unknown coverage format.
        BadFormat,
    }

    impl Coverage {
        fn encode(&self) -> Vec<u8> {
            let mut out = Vec::new();
            match self {
                Coverage::List(glyphs) => {
                    push16(&mut out, 1);
                    push16(&mut out, glyphs.len() as u16);
                    for g in glyphs {
                        push16(&mut out, *g);
                    }
                }
                Coverage::Ranges(ranges) => {
                    push16(&mut out, 2);
                    push16(&mut out, ranges.len() as u16);
                    for (start, end, index) in ranges {
                        push16(&mut out, *start);
                        push16(&mut out, *end);
                        push16(&mut out, *index);
                    }
                }
                Coverage::BadFormat => {
                    push16(&mut out, 9);
                }
            }
            out
        }
    }

    /// Single substitution subtable contents.
    enum Subtable {
        Delta(i16, Coverage),
        List(Vec<u16>, Coverage),
        /// Extension format 1 redirecting to the inner subtable.
        Extension(Box<Subtable>),
        /// Extension subtable with an unsupported substFormat.
        ExtensionBadFormat,
    }

    impl Subtable {
        fn lookup_type(&self) -> u16 {
            match self {
                Subtable::Extension(_) | Subtable::ExtensionBadFormat => 7,
                _ => 1,
            }
        }

        fn encode(&self) -> Vec<u8> {
            let mut out = Vec::new();
            match self {
                Subtable::Delta(delta, coverage) => {
                    push16(&mut out, 1);
                    push16(&mut out, 6); // coverage follows the fixed part
                    push16(&mut out, *delta as u16);
                    out.extend(coverage.encode());
                }
                Subtable::List(substitutes, coverage) => {
                    push16(&mut out, 2);
                    push16(&mut out, 6 + substitutes.len() as u16 * 2);
                    push16(&mut out, substitutes.len() as u16);
                    for s in substitutes {
                        push16(&mut out, *s);
                    }
                    out.extend(coverage.encode());
                }
                Subtable::Extension(inner) => {
                    push16(&mut out, 1);
                    push16(&mut out, inner.lookup_type());
                    push32(&mut out, 8); // inner subtable follows the header
                    out.extend(inner.encode());
                }
                Subtable::ExtensionBadFormat => {
                    push16(&mut out, 2);
                    push16(&mut out, 1);
                    push32(&mut out, 8);
                }
            }
            out
        }
    }

    struct Feature {
        tag: Tag,
        params_offset: u16,
        lookup_indices: Vec<u16>,
    }

    struct GsubBuilder {
        script_tag: Tag,
        lang_sys_tag: Tag,
        /// Encode a default LangSys instead of a tagged record.
        use_default_lang_sys: bool,
        required_feature: u16,
        feature_indices: Vec<u16>,
        features: Vec<Feature>,
        lookups: Vec<Subtable>,
    }

    impl GsubBuilder {
        fn single(subtable: Subtable) -> Self {
            Self {
                script_tag: KANA,
                lang_sys_tag: JAN,
                use_default_lang_sys: false,
                required_feature: 0xffff,
                feature_indices: vec![0],
                features: vec![Feature {
                    tag: HWID,
                    params_offset: 0,
                    lookup_indices: vec![0],
                }],
                lookups: vec![subtable],
            }
        }

        fn encode(&self) -> Vec<u8> {
            let mut out = Vec::new();
            push16(&mut out, 1); // majorVersion
            push16(&mut out, 0); // minorVersion
            let header_offsets = out.len();
            push16(&mut out, 0); // scriptListOffset
            push16(&mut out, 0); // featureListOffset
            push16(&mut out, 0); // lookupListOffset

            // ScriptList with a single script record.
            let script_list = out.len();
            patch16(&mut out, header_offsets, script_list as u16);
            push16(&mut out, 1);
            push32(&mut out, self.script_tag);
            let script_offset_at = out.len();
            push16(&mut out, 0);
            let script = out.len();
            patch16(&mut out, script_offset_at, (script - script_list) as u16);
            if self.use_default_lang_sys {
                push16(&mut out, 4); // defaultLangSysOffset: right after the header
                push16(&mut out, 0); // langSysCount
            } else {
                push16(&mut out, 0); // no default LangSys
                push16(&mut out, 1);
                push32(&mut out, self.lang_sys_tag);
                push16(&mut out, 10); // langSysOffset: record table follows
            }
            push16(&mut out, 0); // lookupOrderOffset
            push16(&mut out, self.required_feature);
            push16(&mut out, self.feature_indices.len() as u16);
            for i in &self.feature_indices {
                push16(&mut out, *i);
            }

            // FeatureList.
            let feature_list = out.len();
            patch16(&mut out, header_offsets + 2, feature_list as u16);
            push16(&mut out, self.features.len() as u16);
            let mut record_offsets = Vec::new();
            for f in &self.features {
                push32(&mut out, f.tag);
                record_offsets.push(out.len());
                push16(&mut out, 0);
            }
            for (f, record_offset) in self.features.iter().zip(record_offsets) {
                let feature = out.len();
                patch16(&mut out, record_offset, (feature - feature_list) as u16);
                push16(&mut out, f.params_offset);
                push16(&mut out, f.lookup_indices.len() as u16);
                for i in &f.lookup_indices {
                    push16(&mut out, *i);
                }
            }

            // LookupList.
            let lookup_list = out.len();
            patch16(&mut out, header_offsets + 4, lookup_list as u16);
            push16(&mut out, self.lookups.len() as u16);
            let mut lookup_offsets = Vec::new();
            for _ in &self.lookups {
                lookup_offsets.push(out.len());
                push16(&mut out, 0);
            }
            for (subtable, lookup_offset) in self.lookups.iter().zip(lookup_offsets) {
                let lookup = out.len();
                patch16(&mut out, lookup_offset, (lookup - lookup_list) as u16);
                push16(&mut out, subtable.lookup_type());
                push16(&mut out, 0); // lookupFlag
                push16(&mut out, 1); // subTableCount
                push16(&mut out, 8); // subtable follows the header
                out.extend(subtable.encode());
            }
            out
        }
    }

    fn push16(out: &mut Vec<u8>, v: u16) {
        out.extend_from_slice(&v.to_be_bytes());
    }

    fn push32(out: &mut Vec<u8>, v: u32) {
        out.extend_from_slice(&v.to_be_bytes());
    }

    fn patch16(out: &mut [u8], at: usize, v: u16) {
        out[at..at + 2].copy_from_slice(&v.to_be_bytes());
    }

    fn parse(data: &[u8]) -> SubstMap {
        single_subst_map(data, HWID, KANA, JAN)
    }

    #[test]
    fn test_format2_list() {
        let gsub = GsubBuilder::single(Subtable::List(
            vec![200, 201],
            Coverage::List(vec![10, 11]),
        ))
        .encode();
        let map = parse(&gsub);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&10), Some(&200));
        assert_eq!(map.get(&11), Some(&201));
    }

    #[test]
    fn test_format1_delta_wraps() {
        let gsub = GsubBuilder::single(Subtable::Delta(
            -3,
            Coverage::List(vec![1, 40]),
        ))
        .encode();
        let map = parse(&gsub);
        assert_eq!(map.get(&40), Some(&37));
        // 1 + (-3) wraps modulo 2^16.
        assert_eq!(map.get(&1), Some(&0xfffe));
    }

    #[test]
    fn test_coverage_ranges() {
        let gsub = GsubBuilder::single(Subtable::Delta(
            100,
            Coverage::Ranges(vec![(5, 7, 0), (20, 20, 3)]),
        ))
        .encode();
        let map = parse(&gsub);
        assert_eq!(map.len(), 4);
        assert_eq!(map.get(&6), Some(&106));
        assert_eq!(map.get(&20), Some(&120));
    }

    #[test]
    fn test_coverage_range_start_after_end() {
        let gsub = GsubBuilder::single(Subtable::Delta(
            1,
            Coverage::Ranges(vec![(9, 3, 0)]),
        ))
        .encode();
        assert!(parse(&gsub).is_empty());
    }

    #[test]
    fn test_coverage_range_bad_start_index() {
        let gsub = GsubBuilder::single(Subtable::Delta(
            1,
            Coverage::Ranges(vec![(5, 7, 0), (20, 21, 2)]),
        ))
        .encode();
        assert!(parse(&gsub).is_empty());
    }

    #[test]
    fn test_coverage_bad_format() {
        let gsub =
            GsubBuilder::single(Subtable::Delta(1, Coverage::BadFormat)).encode();
        assert!(parse(&gsub).is_empty());
    }

    #[test]
    fn test_extension_redirect() {
        let gsub = GsubBuilder::single(Subtable::Extension(Box::new(Subtable::List(
            vec![77],
            Coverage::List(vec![7]),
        ))))
        .encode();
        let map = parse(&gsub);
        assert_eq!(map.get(&7), Some(&77));
    }

    #[test]
    fn test_extension_bad_format_skipped() {
        let gsub = GsubBuilder::single(Subtable::ExtensionBadFormat).encode();
        assert!(parse(&gsub).is_empty());
    }

    #[test]
    fn test_nested_extension_fails_closed() {
        // type 7 -> type 7: the rewrite happens once and the inner
        // extension is not a single substitution, so nothing maps.
        let gsub = GsubBuilder::single(Subtable::Extension(Box::new(Subtable::Extension(
            Box::new(Subtable::List(vec![77], Coverage::List(vec![7]))),
        ))))
        .encode();
        assert!(parse(&gsub).is_empty());
    }

    #[test]
    fn test_feature_params_abandons_table() {
        let mut builder = GsubBuilder::single(Subtable::List(
            vec![200],
            Coverage::List(vec![10]),
        ));
        builder.features[0].params_offset = 12;
        assert!(parse(&builder.encode()).is_empty());
    }

    #[test]
    fn test_wrong_script_tag() {
        let mut builder = GsubBuilder::single(Subtable::Delta(1, Coverage::List(vec![4])));
        builder.script_tag = tag_from_bytes(b"latn");
        assert!(parse(&builder.encode()).is_empty());
    }

    #[test]
    fn test_wrong_lang_sys_without_default() {
        let mut builder = GsubBuilder::single(Subtable::Delta(1, Coverage::List(vec![4])));
        builder.lang_sys_tag = tag_from_bytes(b"KOR ");
        assert!(parse(&builder.encode()).is_empty());
    }

    #[test]
    fn test_default_lang_sys_selected() {
        let mut builder = GsubBuilder::single(Subtable::Delta(2, Coverage::List(vec![4])));
        builder.use_default_lang_sys = true;
        let map = parse(&builder.encode());
        assert_eq!(map.get(&4), Some(&6));
    }

    #[test]
    fn test_required_feature_index_collected() {
        let mut builder = GsubBuilder::single(Subtable::List(
            vec![50],
            Coverage::List(vec![5]),
        ));
        builder.required_feature = 0;
        builder.feature_indices = vec![];
        let map = parse(&builder.encode());
        assert_eq!(map.get(&5), Some(&50));
    }

    #[test]
    fn test_only_first_matching_feature() {
        let mut builder = GsubBuilder::single(Subtable::List(
            vec![100],
            Coverage::List(vec![1]),
        ));
        builder.lookups.push(Subtable::List(vec![200], Coverage::List(vec![2])));
        builder.features.push(Feature {
            tag: HWID,
            params_offset: 0,
            lookup_indices: vec![1],
        });
        builder.feature_indices = vec![0, 1];
        let map = parse(&builder.encode());
        assert_eq!(map.get(&1), Some(&100));
        assert_eq!(map.get(&2), None);
    }

    #[test]
    fn test_non_matching_feature_tag_skipped() {
        let mut builder = GsubBuilder::single(Subtable::List(
            vec![100],
            Coverage::List(vec![1]),
        ));
        builder.features.insert(
            0,
            Feature {
                tag: tag_from_bytes(b"liga"),
                params_offset: 0,
                lookup_indices: vec![0],
            },
        );
        // Record 0 is liga, record 1 is hwid; only the latter matches.
        builder.feature_indices = vec![0, 1];
        let map = parse(&builder.encode());
        assert_eq!(map.get(&1), Some(&100));
    }

    #[test]
    fn test_lookup_index_out_of_bounds() {
        let mut builder = GsubBuilder::single(Subtable::Delta(1, Coverage::List(vec![4])));
        builder.features[0].lookup_indices = vec![3];
        assert!(parse(&builder.encode()).is_empty());
    }

    #[test]
    fn test_feature_index_out_of_bounds() {
        let mut builder = GsubBuilder::single(Subtable::Delta(1, Coverage::List(vec![4])));
        builder.feature_indices = vec![9];
        assert!(parse(&builder.encode()).is_empty());
    }

    #[test]
    fn test_empty_and_short_tables() {
        assert!(parse(&[]).is_empty());
        assert!(parse(&[0, 1, 0, 0]).is_empty());
        assert!(parse(&[0u8; 9]).is_empty());
    }

    #[test]
    fn test_truncation_never_reads_out_of_bounds() {
        let gsub = GsubBuilder::single(Subtable::List(
            vec![200, 201],
            Coverage::List(vec![10, 11]),
        ))
        .encode();
        // Every truncation either fails structurally (empty map) or, for
        // prefixes that still contain the whole lookup, parses cleanly.
        for len in 0..gsub.len() {
            let _ = parse(&gsub[..len]);
        }
    }

    #[test]
    fn test_format2_coverage_shorter_than_glyph_count() {
        // glyphCount of 2 against a single-entry coverage must abandon
        // the parse instead of mapping the first entry.
        let gsub = GsubBuilder::single(Subtable::List(
            vec![200, 201],
            Coverage::List(vec![10]),
        ))
        .encode();
        assert!(parse(&gsub).is_empty());
    }
}
