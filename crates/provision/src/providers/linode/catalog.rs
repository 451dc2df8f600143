//! Static Linode catalog.

use crate::providers::catalog::size;
use crate::providers::traits::{Region, ServerSize};

pub fn regions() -> Vec<Region> {
    vec![
        Region::new("us-east", "Newark, NJ"),
        Region::new("us-central", "Dallas, TX"),
        Region::new("us-west", "Fremont, CA"),
        Region::new("us-southeast", "Atlanta, GA"),
        Region::new("ca-central", "Toronto, CA"),
        Region::new("eu-west", "London, UK"),
        Region::new("eu-central", "Frankfurt, DE"),
        Region::new("ap-south", "Singapore, SG"),
        Region::new("ap-northeast", "Tokyo, JP"),
        Region::new("ap-southeast", "Sydney, AU"),
    ]
}

pub fn sizes() -> Vec<ServerSize> {
    vec![
        size("g6-nanode-1", 1, 1024, 25, "$5.00"),
        size("g6-standard-1", 1, 2048, 50, "$12.00"),
        size("g6-standard-2", 2, 4096, 80, "$24.00"),
        size("g6-standard-4", 4, 8192, 160, "$48.00"),
        size("g6-standard-6", 6, 16384, 320, "$96.00"),
    ]
}
