use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(BookingId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub time: String,
    pub name: String,
    pub phone: String,
}

impl Booking {
    pub fn occupant(&self) -> Occupant {
        Occupant {
            id: self.id.clone(),
            name: self.name.clone(),
            phone: self.phone.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    pub id: BookingId,
    pub name: String,
    pub phone: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_id_serializes_as_plain_string() {
        let booking = Booking {
            id: BookingId::from("64f0c2"),
            time: "8:00 AM".into(),
            name: "A".into(),
            phone: "555-0001".into(),
        };
        let json = serde_json::to_value(&booking).expect("json");
        assert_eq!(json["id"], "64f0c2");
        assert_eq!(booking.occupant().id.as_str(), "64f0c2");
    }
}
