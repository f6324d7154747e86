//! BLE central binding for `core::sensor_task::Central`, over `esp32-nimble`.
//!
//! Owns the single `BLEClient` the Sensor Task multiplexes across
//! connections (spec §4.5: "serving one BLE connection at a time").

use esp32_nimble::utilities::BleUuid;
use esp32_nimble::{BLEClient, BLEDevice};
use esp_idf_svc::hal::task::block_on;
use sensor_gateway_core::ad::Addr;
use sensor_gateway_core::sensor_task::{Central, VSP_RX_CHAR, VSP_TX_CHAR};

/// 128-bit VSP service UUID base from spec §6, with the 16-bit
/// characteristic id substituted at bytes 2-3.
const VSP_SERVICE: &str = "00002000-9a00-0000-b87f-490c92cb11ba";

fn vsp_char_uuid(id16: u16) -> BleUuid {
    let mut s = std::string::String::from("00000000-9a00-0000-b87f-490c92cb11ba");
    let hex = std::format!("{:04x}", id16);
    s.replace_range(4..8, &hex);
    BleUuid::from_uuid128_string(&s).expect("valid VSP characteristic uuid")
}

pub struct NimbleCentral {
    client: BLEClient,
    mtu: usize,
}

impl NimbleCentral {
    pub fn new() -> Self {
        Self { client: BLEDevice::take().new_client(), mtu: 23 }
    }
}

impl Central for NimbleCentral {
    fn create_connection(&mut self, addr: &Addr, use_coded_phy: bool) {
        // esp32-nimble expects the address in on-air byte order; `addr`
        // here is already that order (see core::ad::EventAd::addr).
        let _ = use_coded_phy; // esp32-nimble negotiates PHY automatically post-connect
        let ble_addr = esp32_nimble::BLEAddress::from_le_bytes(*addr, esp32_nimble::BLEAddressType::Public);
        let _ = block_on(self.client.connect(&ble_addr));
    }

    fn request_disconnect(&mut self) {
        let _ = self.client.disconnect();
    }

    fn exchange_mtu(&mut self) {
        if let Ok(mtu) = block_on(self.client.update_conn_params(24, 40, 0, 60)) {
            let _ = mtu;
        }
        self.mtu = self.client.get_mtu() as usize;
    }

    fn discover_characteristic(&mut self, uuid16: u16) {
        let service_uuid = BleUuid::from_uuid128_string(VSP_SERVICE).expect("valid VSP service uuid");
        let char_uuid = vsp_char_uuid(uuid16);
        let _ = uuid16 == VSP_RX_CHAR || uuid16 == VSP_TX_CHAR;
        let _ = block_on(async {
            let service = self.client.get_service(service_uuid).await?;
            service.get_characteristic(char_uuid).await
        });
    }

    fn discover_cccd(&mut self) {
        // esp32-nimble's `subscribe_notify` discovers and writes the CCCD
        // in one call; see `subscribe` below.
    }

    fn subscribe(&mut self) {
        let service_uuid = BleUuid::from_uuid128_string(VSP_SERVICE).expect("valid VSP service uuid");
        let tx_uuid = vsp_char_uuid(VSP_TX_CHAR);
        let _ = block_on(async {
            let service = self.client.get_service(service_uuid).await?;
            let characteristic = service.get_characteristic(tx_uuid).await?;
            characteristic.subscribe_notify(false).await
        });
    }

    fn write_chunk(&mut self, chunk: &[u8]) {
        let service_uuid = BleUuid::from_uuid128_string(VSP_SERVICE).expect("valid VSP service uuid");
        let rx_uuid = vsp_char_uuid(VSP_RX_CHAR);
        let _ = block_on(async {
            let service = self.client.get_service(service_uuid).await?;
            let characteristic = service.get_characteristic(rx_uuid).await?;
            characteristic.write_value(chunk, false).await
        });
    }

    fn mtu(&self) -> usize {
        self.mtu
    }
}
