//! The titlebar-less rule set for VS Code.
//!
//! Three targets: the Electron main-process bundle (window style), the
//! workbench bundle (layout), and the workbench stylesheet (appended rules).
//! These strings track the minified bundles of the host releases named in
//! [`VERSION_RANGE`] and have to be revisited whenever the host changes them.

use super::{FilePatchSet, PatchRule, RuleError, RuleSet};

pub const MAIN_JS: &str = "vs/code/electron-main/main.js";
pub const WORKBENCH_JS: &str = "vs/workbench/workbench.main.js";
pub const WORKBENCH_CSS: &str = "vs/workbench/workbench.main.css";

/// Host releases these rules were written against.
pub const VERSION_RANGE: &str = ">=1.17.0, <1.19.0";

/// Appended verbatim to [`WORKBENCH_CSS`].
pub const STYLESHEET: &str = include_str!("../../assets/workbench.main.css");

/// Full `layout` method of the workbench, capturing its parameter, its body,
/// and the object `getZoomFactor()` is called on.
///
/// Minified identifiers are ASCII, so the word boundary is ASCII-only.
const LAYOUT_PATTERN: &str = r"\.layout=function\((\w+)\)\{(this\.workbenchSize=[\s\S]*(?-u:\b)(\w+)\.getZoomFactor\(\)[\s\S]*contextViewService\.layout\(\))\}";

/// Prepend traffic-light sizing to the workbench `layout` body.
///
/// Groups: `[param, body, browser]`.
pub fn layout_transform(_full: &str, groups: &[&str]) -> String {
    let param = groups.first().copied().unwrap_or_default();
    let body = groups.get(1).copied().unwrap_or_default();
    let browser = groups.get(2).copied().unwrap_or_default();
    format!(
        r#".layout=function({param}){{
          if ("custom" === this.partService.configurationService.getValue().window.titleBarStyle) {{
            var factor = {browser}.getZoomFactor();
            var width = 78 / factor;
            var height = 35 / factor;
            var style = document.documentElement.style;
            style.setProperty("--traffic-lights-width", width + "px");
            style.setProperty("--traffic-lights-height", height + "px");
            this.workbenchContainer.classList.add("titlebar-less");
            this.partLayoutInfo.activitybar.width = width;
          }}
          {body}
        }}"#
    )
}

/// Build the rule set. Fails only if a pattern does not compile.
pub fn rule_set() -> Result<RuleSet, RuleError> {
    let layout = PatchRule::pattern(
        "size traffic lights in layout()",
        LAYOUT_PATTERN,
        layout_transform,
    )
    .map_err(|source| RuleError::InvalidPattern {
        target: WORKBENCH_JS.to_string(),
        source,
    })?;

    let rules = RuleSet::new(
        "titlebar-less",
        vec![
            FilePatchSet::new(
                MAIN_JS,
                vec![PatchRule::literal(
                    "hidden-inset title bar",
                    r#".titleBarStyle="hidden","#,
                    r#".titleBarStyle="hidden-inset","#,
                )],
            ),
            FilePatchSet::new(
                WORKBENCH_JS,
                vec![
                    PatchRule::literal(
                        "never show the custom title bar part",
                        r#"TITLEBAR_PART:return"custom"===this.getCustomTitleBarStyle()&&!h.isFullscreen()"#,
                        "TITLEBAR_PART:return false",
                    ),
                    layout,
                ],
            ),
            FilePatchSet::new(
                WORKBENCH_CSS,
                vec![PatchRule::append("titlebar-less stylesheet", STYLESHEET)],
            ),
        ],
    )
    .with_version_range(VERSION_RANGE);

    rules.validate()?;
    Ok(rules)
}
