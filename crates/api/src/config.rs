//! Types for use when configuring missive modules.

use crate::*;

/// helper transcode function
fn tc<S: serde::Serialize, D: serde::de::DeserializeOwned>(
    s: &S,
) -> MsvResult<D> {
    serde_json::from_str(
        &serde_json::to_string(s)
            .map_err(|e| MsvError::encoding_src("encode", e))?,
    )
    .map_err(|e| MsvError::encoding_src("decode", e))
}

/// Denotes a type used to configure a specific missive module.
///
/// The types defined through this trait are for configuration that
/// cannot be changed at runtime, the likes of which might be found in a
/// configuration file. The protocol context's replay window is the
/// canonical example: set once at construction, read by every
/// verification.
pub trait ModConfig:
    'static
    + Sized
    + Default
    + std::fmt::Debug
    + serde::Serialize
    + serde::de::DeserializeOwned
    + Send
    + Sync
{
}

/// Missive configuration: a json map of module name to module config.
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Config(serde_json::Map<String, serde_json::Value>);

impl Config {
    /// Add a module's default configuration parameters to this config,
    /// e.g. when generating an example configuration file.
    pub fn add_default_module_config<M: ModConfig>(
        &mut self,
        module_name: String,
    ) -> MsvResult<()> {
        if self.0.contains_key(&module_name) {
            return Err(MsvError::encoding(format!(
                "Refusing to overwrite conflicting module name: {module_name}"
            )));
        }
        self.0.insert(module_name, tc(&M::default())?);
        Ok(())
    }

    /// Extract a module config from this config map. Note that this
    /// config is loaded from disk and can be edited by humans, so the
    /// serialization on the module config should be tolerant to missing
    /// properties, setting sane defaults.
    pub fn get_module_config<M: ModConfig>(
        &self,
        module_name: &str,
    ) -> MsvResult<M> {
        self.0
            .get(module_name)
            .map(tc)
            .unwrap_or_else(|| Ok(M::default()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, Default, serde::Serialize, serde::Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct TestMod {
        #[serde(default)]
        window_ms: u64,
    }

    impl ModConfig for TestMod {}

    #[test]
    fn default_and_override() {
        let mut config = Config::default();
        config
            .add_default_module_config::<TestMod>("testMod".into())
            .unwrap();
        assert_eq!(
            r#"{"testMod":{"windowMs":0}}"#,
            serde_json::to_string(&config).unwrap(),
        );

        let config: Config = serde_json::from_str(
            r#"{ "testMod": { "windowMs": 42, "extra": "ignored" } }"#,
        )
        .unwrap();
        assert_eq!(
            TestMod { window_ms: 42 },
            config.get_module_config("testMod").unwrap(),
        );

        // unset modules get the default
        assert_eq!(
            TestMod::default(),
            config.get_module_config("NOT-SET").unwrap(),
        );
    }
}
