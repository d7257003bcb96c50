/*!
Thin forwarding wrappers around the `memchr` crate.

These exist so that the acceleration code can name its dependency in one
place, and so the call sites read the same way whether one, two or three
exit bytes are being hunted.
*/

#[inline(always)]
pub(crate) fn memchr(n1: u8, haystack: &[u8]) -> Option<usize> {
    memchr::memchr(n1, haystack)
}

#[inline(always)]
pub(crate) fn memchr2(n1: u8, n2: u8, haystack: &[u8]) -> Option<usize> {
    memchr::memchr2(n1, n2, haystack)
}

#[inline(always)]
pub(crate) fn memchr3(
    n1: u8,
    n2: u8,
    n3: u8,
    haystack: &[u8],
) -> Option<usize> {
    memchr::memchr3(n1, n2, n3, haystack)
}
