//! The built-in patch: react-json-view italic styling fix.
//!
//! `JsonFormatter.tsx` embeds a `<style>` block that tries to force
//! `font-style: normal` on the JSON viewer. The viewer still renders quotes
//! in italics, so the block is swapped for a broader override.
//!
//! Both blocks are kept byte-for-byte, including the whitespace-only lines
//! and the backslash-escaped backticks, because matching is exact.

use crate::config::schema::{Metadata, MissingPolicy, PatchConfig, PatchDefinition};

/// Target file, relative to the working directory.
pub const TARGET_FILE: &str = "JsonFormatter.tsx";

/// Identifier of the built-in patch.
pub const PATCH_ID: &str = "json-viewer-italic";

/// Printed once a run finishes, whether or not anything was replaced.
pub const COMPLETION_MESSAGE: &str = "修复完成";

/// Style block the viewer shipped with.
pub const OLD_STYLE_BLOCK: &str = r#"      <style>{\`
        /* 全局覆盖所有可能的斜体样式 */
        .react-json-view,
        .react-json-view *,
        .react-json-view *::before,
        .react-json-view *::after {
          font-style: normal !important;
        }
        
        /* 强制覆盖所有字体样式 */
        .react-json-view span {
          font-style: normal !important;
        }
        
        /* 覆盖所有可能的应用了斜体的元素 */
        .react-json-view .value,
        .react-json-view .string,
        .react-json-view .number,
        .react-json-view .boolean,
        .react-json-view .null,
        .react-json-view .key {
          font-style: normal !important;
        }
        
        /* 覆盖所有子元素 */
        .react-json-view > div > span,
        .react-json-view > div > div {
          font-style: normal !important;
        }
        
        /* 覆盖深层嵌套元素 */
        .react-json-view span span,
        .react-json-view span div {
          font-style: normal !important;
        }
        
        /* 确保所有文本节点都是正常样式 */
        .react-json-view .rjv-value,
        .react-json-view .rjv-key,
        .react-json-view .rjv-string {
          font-style: normal !important;
        }
      \`}</style>"#;

/// Replacement style block.
pub const NEW_STYLE_BLOCK: &str = r#"      <style>{\`
        /* JSON引号斜体修复 - 最高优先级 */
        .react-json-view,
        .react-json-view *,
        .react-json-view *:before,
        .react-json-view *:after,
        .react-json-view span,
        .react-json-view div,
        .react-json-view label {
          font-style: normal !important;
          all: normal !important;
        }
        
        .react-json-view span *,
        .react-json-view div *,
        .react-json-view span span {
          font-style: normal !important;
          all: normal !important;
        }
        
        [style*="italic"] {
          font-style: normal !important;
        }
        
        .wmde-markdown-color .react-json-view * {
          font-style: normal !important;
        }
      \`}</style>"#;

/// The built-in patch as a configuration, resolved against the workspace root.
pub fn builtin_config() -> PatchConfig {
    PatchConfig {
        meta: Metadata {
            name: "react-json-view-italic-fix".to_string(),
            description: Some(
                "Force normal font style in the JSON viewer's embedded style block".to_string(),
            ),
            version_range: None,
            workspace_relative: true,
        },
        patches: vec![PatchDefinition {
            id: PATCH_ID.to_string(),
            file: TARGET_FILE.to_string(),
            old: OLD_STYLE_BLOCK.to_string(),
            new: NEW_STYLE_BLOCK.to_string(),
            on_missing: MissingPolicy::Ignore,
        }],
    }
}
