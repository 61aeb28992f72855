/// Declare intercepted entry points.
///
/// Each entry expands to three items:
///
/// - a static `InterceptSlot` named `$slot` for the real symbol `$name`,
///   whose override is looked up as `$override`;
/// - the exported `$name`, which dispatches to the slot's preferred target
///   (an override anywhere in the global scope, else the real symbol);
/// - the exported override `$override` itself, running `$body`.
///
/// ```ignore
/// intercept! {
///     fn deflateEnd(strm: *mut ZStream) -> c_int => DEFLATE_END, zdefer_deflateEnd {
///         interceptor().deflate_end(strm)
///     }
/// }
/// ```
macro_rules! intercept {
    ($(
        fn $name:ident ( $($arg:ident : $ty:ty),* $(,)? ) -> $ret:ty
            => $slot:ident, $override:ident $body:block
    )*) => {
        $(
            pub(crate) static $slot: ::zdefer_core::InterceptSlot<
                unsafe extern "C" fn($($ty),*) -> $ret,
            > = ::zdefer_core::InterceptSlot::new(
                concat!(stringify!($name), "\0"),
                Some(concat!(stringify!($override), "\0")),
                // zlib is next in load order
                &[],
            );

            #[no_mangle]
            #[allow(non_snake_case)]
            pub unsafe extern "C" fn $name($($arg: $ty),*) -> $ret {
                ($slot.preferred())($($arg),*)
            }

            #[no_mangle]
            #[allow(non_snake_case)]
            pub unsafe extern "C" fn $override($($arg: $ty),*) -> $ret $body
        )*
    };
}
