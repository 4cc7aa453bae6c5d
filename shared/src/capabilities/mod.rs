mod auth;
mod documents;
mod http;
mod kv;
mod location;
mod timer;

pub use self::auth::{Auth, AuthAction, AuthFailure, AuthOperation, AuthOutput, AuthUser, Secret};
pub use self::documents::{DocumentOperation, DocumentOutput, Documents};
pub use self::http::{run_flow, FlowEndpoint, HttpError};
pub use self::kv::{load_guest_snapshot, save_guest_snapshot, KvError, KvKey};
pub use self::location::{
    Coordinates, Location, LocationFailure, LocationOperation, LocationOutput,
};
pub use self::timer::{Timer, TimerId, TimerOperation, TimerOutput, TimerPurpose, TimerSlot, Timers};

pub use crux_core::render::Render;
pub use crux_http::Http;
pub use crux_kv::KeyValue;

use crate::app::App;
use crate::event::Event;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub render: Render<Event>,
    pub http: Http<Event>,
    pub key_value: KeyValue<Event>,
    pub documents: Documents<Event>,
    pub auth: Auth<Event>,
    pub location: Location<Event>,
    pub timer: Timer<Event>,
}
