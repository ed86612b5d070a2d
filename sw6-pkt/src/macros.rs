macro_rules! wire_enum {
    (
        $(#[$outer:meta])*
        pub struct $tname:ident ($repr:ty) {
            $(
                $(#[$arm_attr:meta])*
                $arm:ident = $value:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
        pub struct $tname($repr);

        impl $tname {
            $(
                $(#[$arm_attr])*
                pub const $arm: Self = Self($value);
            )+

            /// Get the raw on-wire value.
            #[inline]
            pub fn raw(self) -> $repr {
                self.0
            }
        }

        impl ::core::convert::From<$repr> for $tname {
            #[inline]
            fn from(value: $repr) -> $tname {
                $tname(value)
            }
        }

        impl ::core::convert::From<$tname> for $repr {
            #[inline]
            fn from(value: $tname) -> $repr {
                value.0
            }
        }
    };
}
