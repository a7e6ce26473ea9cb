//! Value types that may be stored in a segment shared between processes.

/// A value that can be left in shared memory by one process and picked up by
/// another.
///
/// Resume trusts that the bytes of every live slot already form a valid value
/// of the stored type. [`resume`](Resumable::resume) then runs once per live
/// slot to re-establish anything that cannot be carried over byte for byte.
///
/// # Safety
///
/// Implementors must not contain addresses (references, `Box`, `Vec`, `Rc`,
/// ...) or any other state private to one process, and a value's bytes, copied
/// unchanged into another process that maps the same segment, must remain a
/// valid value once `resume` has run on them.
pub unsafe trait Resumable {
    /// Restore in-process invariants after attaching to an existing segment.
    #[inline]
    fn resume(&mut self) {}
}

macro_rules! plain_resumable {
    ($($t:ty),* $(,)?) => {
        $(unsafe impl Resumable for $t {})*
    };
}

plain_resumable!(
    (), bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
);

unsafe impl<T: Resumable, const M: usize> Resumable for [T; M] {
    fn resume(&mut self) {
        for v in self.iter_mut() {
            v.resume();
        }
    }
}

unsafe impl<T: Resumable> Resumable for Option<T> {
    fn resume(&mut self) {
        if let Some(v) = self {
            v.resume();
        }
    }
}

macro_rules! tuple_resumable {
    ($($name:ident)+) => {
        unsafe impl<$($name: Resumable),+> Resumable for ($($name,)+) {
            #[allow(non_snake_case)]
            fn resume(&mut self) {
                let ($($name,)+) = self;
                $($name.resume();)+
            }
        }
    };
}

tuple_resumable!(A);
tuple_resumable!(A B);
tuple_resumable!(A B C);
tuple_resumable!(A B C D);
