//! Static Hetzner Cloud catalog used when the live API is unreachable.

use crate::providers::catalog::size;
use crate::providers::traits::{Region, ServerSize};

pub fn regions() -> Vec<Region> {
    vec![
        Region::new("fsn1", "Falkenstein, DE"),
        Region::new("nbg1", "Nuremberg, DE"),
        Region::new("hel1", "Helsinki, FI"),
        Region::new("ash", "Ashburn, VA, US"),
        Region::new("hil", "Hillsboro, OR, US"),
        Region::new("sin", "Singapore, SG"),
    ]
}

pub fn sizes() -> Vec<ServerSize> {
    vec![
        size("cx22", 2, 4096, 40, "€4.59"),
        size("cx32", 4, 8192, 80, "€7.59"),
        size("cx42", 8, 16384, 160, "€18.59"),
        size("cpx11", 2, 2048, 40, "€5.18"),
        size("cpx21", 3, 4096, 80, "€9.40"),
        size("cpx31", 4, 8192, 160, "€16.90"),
        size("cax11", 2, 4096, 40, "€4.59"),
    ]
}
