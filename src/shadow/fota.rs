//! FOTA and gateway telemetry shadow parsers (spec §4.3 supplement).
//!
//! Parse-only: these extract values the cloud has written into the
//! gateway's own shadow so a firmware-update subsystem can act on them.
//! Acting on the result (fetching images, flashing, rebooting) is out of
//! scope for this crate — see spec §1.

use super::parser::{ParentMode, ShadowParser, TokenType};

/// One FOTA image's desired state, as published under
/// `state.[reported.]<image>.{desired,desiredFilename,switchover,start,errorCount}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FotaImageState<'a> {
    pub desired_version: Option<&'a str>,
    pub desired_filename: Option<&'a str>,
    pub switchover: Option<u64>,
    pub start: Option<u64>,
    pub error_count: Option<u64>,
}

/// Descend `state -> [reported ->] <image_key>` and pull out the FOTA
/// fields for that image. `reported` is only descended into when `in_get_accepted`
/// is set, matching the source's handling of `get/accepted` vs `update/delta`
/// documents (the latter has no `reported` wrapper).
pub fn parse_fota_image<'a>(json: &'a str, image_key: &str, in_get_accepted: bool) -> Option<FotaImageState<'a>> {
    let mut p: ShadowParser<128> = ShadowParser::parse(json);
    p.find_type("state", TokenType::Object, ParentMode::Any)?;
    if in_get_accepted {
        p.find_type("reported", TokenType::Object, ParentMode::NextParent)?;
    }
    p.find_type(image_key, TokenType::Object, ParentMode::NextParent)?;

    let mut out = FotaImageState::default();
    if let Some(i) = p.find_type("desired", TokenType::String, ParentMode::NextParent) {
        out.desired_version = Some(p.string(i));
    }
    if let Some(i) = p.find_type("desiredFilename", TokenType::String, ParentMode::NextParent) {
        out.desired_filename = Some(p.string(i));
    }
    if let Some(i) = p.find_type("switchover", TokenType::Primitive, ParentMode::NextParent) {
        out.switchover = p.convert_uint(i);
    }
    if let Some(i) = p.find_type("start", TokenType::Primitive, ParentMode::NextParent) {
        out.start = p.convert_uint(i);
    }
    if let Some(i) = p.find_type("errorCount", TokenType::Primitive, ParentMode::NextParent) {
        out.error_count = p.convert_uint(i);
    }
    Some(out)
}

/// Extract `state.[reported.]fwBridge`, the FOTA download host override.
pub fn parse_fota_host<'a>(json: &'a str, in_get_accepted: bool) -> Option<&'a str> {
    let mut p: ShadowParser<64> = ShadowParser::parse(json);
    p.find_type("state", TokenType::Object, ParentMode::Any)?;
    if in_get_accepted {
        p.find_type("reported", TokenType::Object, ParentMode::NextParent)?;
    }
    let i = p.find_type("fwBridge", TokenType::String, ParentMode::NextParent)?;
    Some(p.string(i))
}

/// Extract `state.[reported.]blockSize`, the CoAP block-transfer size.
pub fn parse_fota_block_size(json: &str, in_get_accepted: bool) -> Option<u64> {
    let mut p: ShadowParser<64> = ShadowParser::parse(json);
    p.find_type("state", TokenType::Object, ParentMode::Any)?;
    if in_get_accepted {
        p.find_type("reported", TokenType::Object, ParentMode::NextParent)?;
    }
    let i = p.find_type("blockSize", TokenType::Primitive, ParentMode::NextParent)?;
    p.convert_uint(i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_desired_version_and_switchover_from_delta() {
        let json = r#"{"state":{"app":{"desired":"2.1.0","switchover":10}}}"#;
        let fota = parse_fota_image(json, "app", false).unwrap();
        assert_eq!(fota.desired_version, Some("2.1.0"));
        assert_eq!(fota.switchover, Some(10));
    }

    #[test]
    fn descends_through_reported_for_get_accepted_documents() {
        let json = r#"{"state":{"reported":{"modem":{"desired":"1.0.0","errorCount":2}}}}"#;
        let fota = parse_fota_image(json, "modem", true).unwrap();
        assert_eq!(fota.desired_version, Some("1.0.0"));
        assert_eq!(fota.error_count, Some(2));
    }

    #[test]
    fn parses_fw_bridge_host_override() {
        let json = r#"{"state":{"fwBridge":"fota.example.com"}}"#;
        assert_eq!(parse_fota_host(json, false), Some("fota.example.com"));
    }

    #[test]
    fn parses_block_size() {
        let json = r#"{"state":{"blockSize":512}}"#;
        assert_eq!(parse_fota_block_size(json, false), Some(512));
    }
}
