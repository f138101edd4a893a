//! Field selectors: the `element`/`row` vocabulary of each addressable table.
//!
//! Singleton tables (SystemState, EyeOverlayState) select a field with
//! `element`. Per-entry tables (servo config/runtime, eye profiles) select
//! the entry with `element` and the field with `row`.

use super::VariableType;

macro_rules! field_selector {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal => $kind:ident, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $value, )+
        }

        impl $name {
            /// Every selector, in wire order.
            pub const ALL: &'static [Self] = &[ $( Self::$variant, )+ ];

            /// Convert from raw `u8`. Returns `None` for invalid values.
            #[inline]
            pub const fn from_u8(value: u8) -> Option<Self> {
                match value {
                    $( $value => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// Native representation of the selected field.
            #[inline]
            pub const fn native(self) -> VariableType {
                match self {
                    $( Self::$variant => VariableType::$kind, )+
                }
            }
        }
    };
}

field_selector! {
    /// SystemState fields addressable by DataExchange records (`element`).
    ///
    /// Boot phase, run mode and debug level travel as SystemChange records
    /// (or through the mode/debug sentinel), never through this table.
    pub enum SystemField {
        /// Servo channel selected for instrumentation.
        DebugServo = 0 => Int,
        /// Scaled servo supply voltage.
        ServoVoltage = 1 => Int,
        /// Scaled servo supply current.
        ServoCurrent = 2 => Int,
        /// First DMX slot of the servo block.
        DmxAddress = 3 => Int,
        /// First DMX slot of the eye block.
        DmxEyeAddress = 4 => Int,
        /// Receive time of the last DMX packet [ms].
        LastPacketTimestamp = 5 => Int,
        /// Packet age limit [ms].
        PacketAgeLimit = 6 => Int,
        /// Demo animation tick [ms].
        DemoInterval = 7 => Int,
        /// DMX-address dip-switch debounce [ms].
        DmxDipInterval = 8 => Int,
        /// Run-mode dip-switch debounce [ms].
        RunModeDipInterval = 9 => Int,
        /// Servo instrumentation sample rate [ms].
        ServoSampleInterval = 10 => Int,
        /// Selected eye profile index.
        EyeColorProfile = 11 => Int,
    }
}

field_selector! {
    /// Mode/debug sentinel fields (`element`), applied to SystemState.
    pub enum ModeDebugField {
        RunMode = 0 => Int,
        DebugLevel = 1 => Int,
    }
}

field_selector! {
    /// ServoRuntimeTable fields (`row`); `element` is the channel.
    pub enum ServoRuntimeField {
        CurrentPos = 0 => Float,
        TargetPos = 1 => Float,
        PreviousPos = 2 => Float,
        LastMove = 3 => Int,
        Active = 4 => Bool,
        PwmEnabled = 5 => Bool,
    }
}

field_selector! {
    /// ServoConfigTable fields (`row`); `element` is the channel.
    pub enum ServoConfigField {
        Licensed = 0 => Bool,
        Smooth = 1 => Bool,
        Analog = 2 => Bool,
        Frequency = 3 => Float,
        ServoMinDeg = 4 => Float,
        ServoMaxDeg = 5 => Float,
        MinPwm = 6 => Float,
        MaxPwm = 7 => Float,
        MinDeg = 8 => Float,
        MaxDeg = 9 => Float,
        StartDeg = 10 => Float,
        MaxVel = 11 => Float,
        MaxAcc = 12 => Float,
        MaxDec = 13 => Float,
        SleepTimer = 14 => Int,
        UserName = 15 => Char,
        PartNumber = 16 => Char,
    }
}

field_selector! {
    /// EyeOverlayState fields (`element`).
    pub enum EyeOverlayField {
        Mode = 0 => Int,
        Brightness = 1 => Int,
        Red = 2 => Int,
        Green = 3 => Int,
        Blue = 4 => Int,
        LastUpdate = 5 => Int,
        UpdateRate = 6 => Int,
    }
}

field_selector! {
    /// EyeProfileTable fields (`row`); `element` is the profile index.
    pub enum EyeProfileField {
        BaseColor = 0 => Int,
        FlickerColor = 1 => Int,
        BlackColor = 2 => Int,
        FlickerDelay = 3 => Int,
        FlickerRange = 4 => Int,
        Brightness = 5 => Int,
        BaseColorTime = 6 => Int,
        FlickerColorTime = 7 => Int,
        BlackColorTime = 8 => Int,
        DmxStart = 9 => Int,
        DmxEnd = 10 => Int,
        Mode = 11 => Int,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_roundtrip_through_u8() {
        for &f in ServoConfigField::ALL {
            assert_eq!(ServoConfigField::from_u8(f as u8), Some(f));
        }
        for &f in EyeProfileField::ALL {
            assert_eq!(EyeProfileField::from_u8(f as u8), Some(f));
        }
        assert!(ServoRuntimeField::from_u8(ServoRuntimeField::ALL.len() as u8).is_none());
        assert!(SystemField::from_u8(200).is_none());
    }

    #[test]
    fn native_types() {
        assert_eq!(ServoConfigField::UserName.native(), VariableType::Char);
        assert_eq!(ServoConfigField::Licensed.native(), VariableType::Bool);
        assert_eq!(ServoRuntimeField::TargetPos.native(), VariableType::Float);
        assert_eq!(EyeOverlayField::Blue.native(), VariableType::Int);
    }
}
