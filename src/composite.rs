use crate::{
    color::PremulRgba8,
    error::{MediaError, MediaResult},
};

/// `round(v / 255)` for `v <= 255 * 255`.
#[inline]
fn div255(v: u32) -> u8 {
    let v = v + 128;
    ((v + (v >> 8)) >> 8) as u8
}

fn check_rgba8_pair(op: &str, dst: &[u8], src: &[u8]) -> MediaResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(MediaError::validation(format!(
            "{op} expects equal-length rgba8 buffers, got {} and {} bytes",
            dst.len(),
            src.len()
        )));
    }
    Ok(())
}

/// Premultiplied source-over of one pixel.
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    match src[3] {
        0 => dst,
        255 => src,
        sa => {
            let keep = u32::from(255 - sa);
            let mut out = src;
            for (o, d) in out.iter_mut().zip(dst) {
                *o = o.saturating_add(div255(u32::from(d) * keep));
            }
            out
        }
    }
}

/// Composite the premultiplied `src` buffer over `dst`.
pub fn over_in_place(dst: &mut [u8], src: &[u8]) -> MediaResult<()> {
    check_rgba8_pair("over_in_place", dst, src)?;
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&out);
    }
    Ok(())
}

/// Composite black at per-pixel coverage `mask` over `dst`.
pub fn darken_in_place(dst: &mut [u8], mask: &[u8]) -> MediaResult<()> {
    if dst.len() != mask.len() * 4 {
        return Err(MediaError::validation(format!(
            "darken_in_place expects one mask byte per pixel, got {} for {} pixels",
            mask.len(),
            dst.len() / 4
        )));
    }
    for (d, &m) in dst.chunks_exact_mut(4).zip(mask) {
        if m == 0 {
            continue;
        }
        let out = over([d[0], d[1], d[2], d[3]], [0, 0, 0, m]);
        d.copy_from_slice(&out);
    }
    Ok(())
}

/// Flatten premultiplied pixels onto an opaque background colour.
pub fn flatten_to_opaque_rgba8(dst: &mut [u8], src: &[u8], bg_rgb: [u8; 3]) -> MediaResult<()> {
    check_rgba8_pair("flatten_to_opaque_rgba8", dst, src)?;
    let [r, g, b] = bg_rgb;
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let out = over([r, g, b, 255], [s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&[out[0], out[1], out[2], 255]);
    }
    Ok(())
}
