//! Pixel-index to sphere-location mapping.
//!
//! Standard HEALPix pixelization math. Both functions return `(z, phi)` with
//! `z = cos(colatitude)` in [-1, 1] and `phi` the azimuth in radians,
//! measured eastward from longitude 0.

use std::f64::consts::PI;

/// Ring index offset of each of the 12 base faces (rows of 4).
const JRLL: [u64; 12] = [2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4];
/// In-ring phi offset of each base face.
const JPLL: [i64; 12] = [1, 3, 5, 7, 0, 2, 4, 6, 1, 3, 5, 7];

/// Location of a pixel in ring ordering.
pub fn pix2loc_ring(nside: u64, pix: u64) -> (f64, f64) {
    let npix = 12 * nside * nside;
    let ncap = 2 * nside * (nside - 1);

    if pix < ncap {
        // North polar cap: ring index from the triangular pixel numbers.
        let iring = (1 + isqrt(1 + 2 * pix)) / 2;
        let iphi = pix + 1 - 2 * iring * (iring - 1);
        let z = 1.0 - (iring * iring) as f64 * 4.0 / npix as f64;
        let phi = (iphi as f64 - 0.5) * PI / (2.0 * iring as f64);
        (z, phi)
    } else if pix < npix - ncap {
        // Equatorial belt: rings of constant length 4·nside.
        let ip = pix - ncap;
        let iring = ip / (4 * nside) + nside;
        let iphi = ip % (4 * nside) + 1;
        // Odd rings are shifted by half a pixel width.
        let fodd = if (iring + nside) & 1 == 1 { 1.0 } else { 0.5 };
        let z = (2 * nside) as f64 - iring as f64;
        let z = z * 2.0 / (3.0 * nside as f64);
        let phi = (iphi as f64 - fodd) * PI / (2.0 * nside as f64);
        (z, phi)
    } else {
        // South polar cap, mirrored from the north.
        let ip = npix - pix;
        let iring = (1 + isqrt(2 * ip - 1)) / 2;
        let iphi = 4 * iring + 1 - (ip - 2 * iring * (iring - 1));
        let z = -1.0 + (iring * iring) as f64 * 4.0 / npix as f64;
        let phi = (iphi as f64 - 0.5) * PI / (2.0 * iring as f64);
        (z, phi)
    }
}

/// Location of a pixel in nested ordering.
pub fn pix2loc_nest(nside: u64, pix: u64) -> (f64, f64) {
    let npix = 12 * nside * nside;
    let npface = nside * nside;

    let face = (pix / npface) as usize;
    let within = pix % npface;
    let ix = compress_even_bits(within);
    let iy = compress_even_bits(within >> 1);

    // Ring index counted from the north pole, 1 ..= 4·nside - 1.
    let jr = JRLL[face] * nside - ix - iy - 1;

    let (nr, z, kshift) = if jr < nside {
        let nr = jr;
        let z = 1.0 - (nr * nr) as f64 * 4.0 / npix as f64;
        (nr, z, 0u64)
    } else if jr > 3 * nside {
        let nr = 4 * nside - jr;
        let z = (nr * nr) as f64 * 4.0 / npix as f64 - 1.0;
        (nr, z, 0u64)
    } else {
        let z = (2 * nside) as f64 - jr as f64;
        let z = z * 2.0 / (3.0 * nside as f64);
        (nside, z, (jr - nside) & 1)
    };

    let mut jp = (JPLL[face] * nr as i64 + ix as i64 - iy as i64 + 1 + kshift as i64) / 2;
    if jp > 4 * nr as i64 {
        jp -= 4 * nr as i64;
    }
    if jp < 1 {
        jp += 4 * nr as i64;
    }

    let phi = (jp as f64 - (kshift as f64 + 1.0) * 0.5) * PI / (2.0 * nr as f64);
    (z, phi)
}

/// Integer square root via the float path, corrected for off-by-one.
fn isqrt(v: u64) -> u64 {
    let mut r = (v as f64).sqrt() as u64;
    while (r + 1) * (r + 1) <= v {
        r += 1;
    }
    while r * r > v {
        r -= 1;
    }
    r
}

/// Gather the even-position bits of `v` into a compact integer.
fn compress_even_bits(v: u64) -> u64 {
    let mut raw = v & 0x5555_5555_5555_5555;
    raw = (raw | (raw >> 1)) & 0x3333_3333_3333_3333;
    raw = (raw | (raw >> 2)) & 0x0f0f_0f0f_0f0f_0f0f;
    raw = (raw | (raw >> 4)) & 0x00ff_00ff_00ff_00ff;
    raw = (raw | (raw >> 8)) & 0x0000_ffff_0000_ffff;
    (raw | (raw >> 16)) & 0x0000_0000_ffff_ffff
}
