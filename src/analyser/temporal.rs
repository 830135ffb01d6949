//! Partitions records by destination address and computes inter-arrival times.
use std::collections::BTreeMap;

use chrono::TimeDelta;

use super::containers::PacketRecord;

/// All records sent towards one destination, in ascending time order.
#[derive(Clone, Debug, PartialEq)]
pub struct AddressGroup {
    /// `None` collects frames without a network layer.
    pub address: Option<String>,
    /// Indices into the record slice.
    pub members: Vec<usize>,
    /// Delta to the previous member; `None` for the first.
    pub inter_arrival: Vec<Option<TimeDelta>>,
}

/// Groups records by destination address.
///
/// Every record lands in exactly one group. Groups are ordered by address,
/// the address-less group first; members are sorted by timestamp with ties
/// kept in capture order.
pub fn partition(records: &[PacketRecord]) -> Vec<AddressGroup> {
    let mut by_destination: BTreeMap<Option<&str>, Vec<usize>> = BTreeMap::new();
    for (index, record) in records.iter().enumerate() {
        by_destination
            .entry(record.ip_dst.as_deref())
            .or_default()
            .push(index);
    }

    let groups: Vec<AddressGroup> = by_destination
        .into_iter()
        .map(|(address, mut members)| {
            members.sort_by_key(|&index| records[index].timestamp);
            let inter_arrival = inter_arrival_times(records, &members);
            AddressGroup {
                address: address.map(str::to_string),
                members,
                inter_arrival,
            }
        })
        .collect();

    log::info!("Partitioned {} records into {} address groups.", records.len(), groups.len());
    groups
}

fn inter_arrival_times(records: &[PacketRecord], members: &[usize]) -> Vec<Option<TimeDelta>> {
    let mut deltas = Vec::with_capacity(members.len());
    deltas.extend(members.first().map(|_| None));
    deltas.extend(
        members
            .windows(2)
            .map(|pair| Some(records[pair[1]].timestamp - records[pair[0]].timestamp)),
    );
    deltas
}
