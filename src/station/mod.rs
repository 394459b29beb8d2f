pub mod decoder;
pub mod history;
pub mod protocol;
pub mod reader;
pub mod session;

pub use decoder::decode_weather_record;
pub use history::address_one_hour_ago;
pub use reader::{MemoryReader, ReaderConfig};
pub use session::{rain_delta, WeatherStation};
