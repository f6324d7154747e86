//! Attribute store binding over `esp-idf-svc`'s NVS, implementing
//! `sensor_gateway_core::attr::AttributeStore`.
//!
//! The core never reads NVS directly (see `core::attr`'s doc comment);
//! this is the only place in the firmware that touches the namespace.

use esp_idf_svc::nvs::{EspNvs, NvsDefault};
use sensor_gateway_core::attr::{AttrValue, AttributeStore};

const NAMESPACE: &str = "gw_attr";

pub struct NvsAttributeStore {
    nvs: EspNvs<NvsDefault>,
}

impl NvsAttributeStore {
    pub fn new(partition: esp_idf_svc::nvs::EspDefaultNvsPartition) -> anyhow::Result<Self> {
        let nvs = EspNvs::new(partition, NAMESPACE, true)?;
        Ok(Self { nvs })
    }
}

impl AttributeStore for NvsAttributeStore {
    fn get_str(&self, name: &str) -> Option<AttrValue> {
        let mut buf = [0u8; 96];
        let value = self.nvs.get_str(name, &mut buf).ok().flatten()?;
        AttrValue::try_from(value).ok()
    }

    fn set_str(&mut self, name: &str, value: &str) -> bool {
        self.nvs.set_str(name, value).is_ok()
    }
}
