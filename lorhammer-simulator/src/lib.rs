/*!
# Lorhammer Simulator

Generates LoRaWAN uplink traffic against a network server by emulating
packet-forwarder gateways, each fronting a set of end devices.

## Key Components:
- **Node:** an activated device producing unconfirmed data uplinks.
- **Gateway:** one UDP socket pushing its nodes' uplinks on a fixed interval
  and classifying whatever the network server sends back.
- **LoadTest:** a fleet of gateways stopped through one cancellation token.
- **Scenario:** a load test bracketed by result checkers.
*/

mod error;
pub mod gateway;
pub mod node;
pub mod scenario;

pub use error::SimulatorError;
pub use gateway::{Gateway, GatewayStats};
pub use load_test::LoadTest;
pub use node::Node;
pub use scenario::{run_scenario, ScenarioReport};
