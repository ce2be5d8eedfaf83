use serde::Deserialize;
use serde_json::Value;

use crate::error::StyleError;
use crate::filter::Filter;

/// `dataConfig.type` of plugins whose features are extruded into 3D faces.
pub const EXTRUSION_TYPE: &str = "3d-extrusion";

/// Geometry-construction parameters of one render plugin.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub altitude_scale: f64,
    pub altitude_property: Option<String>,
    pub default_altitude: f64,
    pub height_property: Option<String>,
    pub default_height: f64,
    pub top: bool,
    pub side: bool,
    pub uv: bool,
    /// Texel-repeat period of generated UVs.
    pub uv_size: [f64; 2],
    pub normal: bool,
    /// Accepted for compatibility; no tangents are generated.
    pub tangent: bool,
    pub shadow_volume: bool,
    /// Direction light travels, in tile space (z up).
    pub shadow_dir: [f64; 3],
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            kind: String::new(),
            altitude_scale: 1.0,
            altitude_property: None,
            default_altitude: 0.0,
            height_property: None,
            default_height: 0.0,
            top: true,
            side: true,
            uv: false,
            uv_size: [128.0, 128.0],
            normal: false,
            tangent: false,
            shadow_volume: false,
            shadow_dir: [1.0, 1.0, -1.0],
        }
    }
}

impl DataConfig {
    pub fn extrusion() -> Self {
        Self {
            kind: EXTRUSION_TYPE.to_string(),
            ..Self::default()
        }
    }

    pub fn is_extrusion(&self) -> bool {
        self.kind == EXTRUSION_TYPE
    }
}

/// A compiled style rule: the predicate and the symbol it applies.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleRule {
    pub filter: Filter,
    pub symbol: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PluginConfig {
    pub plugin_type: String,
    pub style: Vec<StyleRule>,
    pub data_config: DataConfig,
}

/// Immutable result of compiling a layer style.
///
/// Workers hold it behind an `Arc` and swap the whole value on update, so a
/// build that captured the old value finishes against it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledStyle {
    plugins: Vec<PluginConfig>,
}

impl CompiledStyle {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compiles `[{ renderPlugin: { type, dataConfig }, style: [{ filter, symbol }] }]`.
    ///
    /// `null` compiles to an empty style; `{ style: [...] }` is unwrapped.
    pub fn compile(value: &Value) -> Result<Self, StyleError> {
        let plugins = match value {
            Value::Null => return Ok(Self::empty()),
            Value::Array(items) => items,
            Value::Object(obj) => obj
                .get("style")
                .and_then(|v| v.as_array())
                .ok_or(StyleError::NotAnArray)?,
            _ => return Err(StyleError::NotAnArray),
        };

        let plugins = plugins
            .iter()
            .enumerate()
            .map(|(i, p)| compile_plugin(i, p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { plugins })
    }

    pub fn from_plugins(plugins: Vec<PluginConfig>) -> Self {
        Self { plugins }
    }

    pub fn plugins(&self) -> &[PluginConfig] {
        &self.plugins
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

fn compile_plugin(plugin: usize, value: &Value) -> Result<PluginConfig, StyleError> {
    let obj = value.as_object().ok_or_else(|| StyleError::InvalidPlugin {
        plugin,
        reason: "plugin style must be an object".to_string(),
    })?;

    let render_plugin = obj.get("renderPlugin");
    let plugin_type = render_plugin
        .and_then(|r| r.get("type"))
        .and_then(|t| t.as_str())
        .unwrap_or_default()
        .to_string();

    let data_config = match render_plugin.and_then(|r| r.get("dataConfig")) {
        None | Some(Value::Null) => DataConfig::default(),
        Some(v) => DataConfig::deserialize(v).map_err(|e| StyleError::InvalidDataConfig {
            plugin,
            reason: e.to_string(),
        })?,
    };

    let rules: &[Value] = match obj.get("style") {
        None | Some(Value::Null) => &[],
        Some(Value::Array(rules)) => rules,
        Some(_) => {
            return Err(StyleError::InvalidPlugin {
                plugin,
                reason: "style must be an array of rules".to_string(),
            });
        }
    };

    let style = rules
        .iter()
        .enumerate()
        .map(|(rule, r)| {
            let filter = Filter::compile(r.get("filter").unwrap_or(&Value::Null)).map_err(
                |reason| StyleError::InvalidFilter {
                    plugin,
                    rule,
                    reason,
                },
            )?;
            Ok(StyleRule {
                filter,
                symbol: r.get("symbol").cloned().unwrap_or(Value::Null),
            })
        })
        .collect::<Result<Vec<_>, StyleError>>()?;

    Ok(PluginConfig {
        plugin_type,
        style,
        data_config,
    })
}

#[cfg(test)]
mod tests {
    use super::{CompiledStyle, DataConfig};
    use crate::error::StyleError;
    use crate::filter::Filter;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn compiles_plugins_in_declared_order() {
        let style = CompiledStyle::compile(&json!([
            {
                "renderPlugin": {
                    "type": "lit",
                    "dataConfig": { "type": "3d-extrusion", "heightProperty": "height",
                                    "shadowVolume": true }
                },
                "style": [
                    { "filter": ["==", "kind", "tower"], "symbol": { "color": "#f00" } },
                    { "symbol": { "color": "#fff" } }
                ]
            },
            { "renderPlugin": { "type": "line" }, "style": [] }
        ]))
        .expect("compile");

        assert_eq!(style.len(), 2);
        let lit = &style.plugins()[0];
        assert_eq!(lit.plugin_type, "lit");
        assert!(lit.data_config.is_extrusion());
        assert_eq!(lit.data_config.height_property.as_deref(), Some("height"));
        assert!(lit.data_config.shadow_volume);
        assert_eq!(lit.data_config.uv_size, [128.0, 128.0]);
        assert_eq!(lit.style[1].filter, Filter::Always(true));
        assert_eq!(style.plugins()[1].data_config, DataConfig::default());
    }

    #[test]
    fn accepts_null_and_object_wrappers() {
        assert!(CompiledStyle::compile(&json!(null)).unwrap().is_empty());
        let wrapped = CompiledStyle::compile(&json!({ "style": [{ "style": [] }] })).unwrap();
        assert_eq!(wrapped.len(), 1);
    }

    #[test]
    fn missing_or_null_rule_lists_have_no_rules() {
        let style = CompiledStyle::compile(&json!([
            { "renderPlugin": { "type": "a" } },
            { "style": null },
            { "style": [{ "filter": true, "symbol": { "size": 2 } }] }
        ]))
        .unwrap();
        assert!(style.plugins()[0].style.is_empty());
        assert!(style.plugins()[1].style.is_empty());
        assert_eq!(style.plugins()[2].style[0].symbol, json!({ "size": 2 }));
        assert!(matches!(
            CompiledStyle::compile(&json!([{ "style": { "filter": true } }])),
            Err(StyleError::InvalidPlugin { plugin: 0, .. })
        ));
    }

    #[test]
    fn reports_malformed_styles() {
        assert_eq!(
            CompiledStyle::compile(&json!("lit")),
            Err(StyleError::NotAnArray)
        );
        assert!(matches!(
            CompiledStyle::compile(&json!([3])),
            Err(StyleError::InvalidPlugin { plugin: 0, .. })
        ));
        assert!(matches!(
            CompiledStyle::compile(&json!([{ "style": [{}, { "filter": ["?", "a"] }] }])),
            Err(StyleError::InvalidFilter { plugin: 0, rule: 1, .. })
        ));
        assert!(matches!(
            CompiledStyle::compile(&json!([
                { "renderPlugin": { "dataConfig": { "defaultHeight": "tall" } } }
            ])),
            Err(StyleError::InvalidDataConfig { plugin: 0, .. })
        ));
    }
}
