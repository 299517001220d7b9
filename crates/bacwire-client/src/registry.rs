use crate::clock::Clock;
use crate::discovery::{DeviceProperties, DiscoveredDevice};
use bacwire_core::services::IAmRequest;
use bacwire_core::types::DeviceInstance;
use bacwire_datalink::Address;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Entry {
    device: DiscoveredDevice,
    last_seen: Instant,
}

/// Devices heard from, keyed by instance.
///
/// Each entry holds the most recently observed address. Nothing is evicted
/// unless asked; reads return snapshots.
pub struct DeviceRegistry {
    clock: Arc<dyn Clock>,
    devices: Mutex<HashMap<DeviceInstance, Entry>>,
}

impl DeviceRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            devices: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DeviceInstance, Entry>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn upsert(
        &self,
        instance: DeviceInstance,
        address: Address,
        update: impl FnOnce(&mut DiscoveredDevice),
    ) -> DiscoveredDevice {
        let now = self.clock.now();
        let mut devices = self.lock();
        let entry = devices.entry(instance).or_insert_with(|| Entry {
            device: DiscoveredDevice {
                instance,
                address,
                vendor_id: None,
                max_apdu: None,
                segmentation: None,
                properties: DeviceProperties::default(),
            },
            last_seen: now,
        });
        if entry.device.address != address {
            log::debug!(
                "device {instance} moved from {} to {address}",
                entry.device.address
            );
        }
        entry.device.address = address;
        entry.last_seen = now;
        update(&mut entry.device);
        entry.device.clone()
    }

    /// Records an I-Am, keeping any cached properties.
    pub fn record_iam(
        &self,
        instance: DeviceInstance,
        address: Address,
        vendor_id: u16,
    ) -> DiscoveredDevice {
        self.upsert(instance, address, |device| device.vendor_id = Some(vendor_id))
    }

    /// Records a decoded I-Am. Returns `None` when it does not name a device.
    pub fn record_i_am(&self, i_am: &IAmRequest, address: Address) -> Option<DiscoveredDevice> {
        let instance = i_am.device_instance()?;
        let device = self.upsert(instance, address, |device| {
            device.vendor_id = Some(i_am.vendor_id);
            device.max_apdu = Some(i_am.max_apdu);
            device.segmentation = Some(i_am.segmentation);
        });
        log::debug!("i-am from device {instance} at {address}");
        Some(device)
    }

    /// Adds a device known out of band, e.g. behind a BBMD with broadcast
    /// discovery unavailable.
    pub fn register(&self, instance: DeviceInstance, address: Address) -> DiscoveredDevice {
        self.upsert(instance, address, |_| {})
    }

    pub fn lookup(&self, instance: DeviceInstance) -> Option<DiscoveredDevice> {
        self.lock().get(&instance).map(|entry| entry.device.clone())
    }

    /// Every device, ordered by instance.
    pub fn all(&self) -> Vec<DiscoveredDevice> {
        let mut devices: Vec<_> = self.lock().values().map(|e| e.device.clone()).collect();
        devices.sort_by_key(|d| d.instance);
        devices
    }

    /// Devices heard from at or after `since`, ordered by instance.
    pub fn seen_since(&self, since: Instant) -> Vec<DiscoveredDevice> {
        let mut devices: Vec<_> = self
            .lock()
            .values()
            .filter(|e| e.last_seen >= since)
            .map(|e| e.device.clone())
            .collect();
        devices.sort_by_key(|d| d.instance);
        devices
    }

    pub fn last_seen(&self, instance: DeviceInstance) -> Option<Instant> {
        self.lock().get(&instance).map(|entry| entry.last_seen)
    }

    /// Replaces the cached properties. Returns `false` for unknown devices.
    pub fn update_properties(&self, instance: DeviceInstance, properties: DeviceProperties) -> bool {
        match self.lock().get_mut(&instance) {
            Some(entry) => {
                entry.device.properties = properties;
                true
            }
            None => false,
        }
    }

    pub fn evict(&self, instance: DeviceInstance) -> Option<DiscoveredDevice> {
        self.lock().remove(&instance).map(|entry| entry.device)
    }

    /// Evicts devices not heard from within `max_age`; returns how many.
    pub fn evict_stale(&self, max_age: Duration) -> usize {
        let now = self.clock.now();
        let mut devices = self.lock();
        let before = devices.len();
        devices.retain(|_, entry| now.saturating_duration_since(entry.last_seen) <= max_age);
        before - devices.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("devices", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::DeviceRegistry;
    use crate::clock::{Clock, ManualClock};
    use crate::discovery::DeviceProperties;
    use bacwire_core::services::IAmRequest;
    use bacwire_core::types::{DeviceInstance, ObjectId, ObjectType, Segmentation};
    use bacwire_datalink::Address;
    use std::sync::Arc;
    use std::time::Duration;

    fn instance(n: u32) -> DeviceInstance {
        DeviceInstance::new(n).unwrap()
    }

    fn addr(s: &str) -> Address {
        Address::ip(s.parse().unwrap())
    }

    fn registry() -> (Arc<ManualClock>, DeviceRegistry) {
        let clock = Arc::new(ManualClock::new());
        (clock.clone(), DeviceRegistry::new(clock))
    }

    #[test]
    fn latest_address_wins_and_properties_survive() {
        let (_, registry) = registry();
        registry.record_iam(instance(1234), addr("10.0.0.5:47808"), 260);
        registry.update_properties(
            instance(1234),
            DeviceProperties {
                object_name: Some("AHU-1".into()),
                ..DeviceProperties::default()
            },
        );
        registry.record_iam(instance(1234), addr("10.0.0.6:47808"), 260);

        let device = registry.lookup(instance(1234)).unwrap();
        assert_eq!(device.address, addr("10.0.0.6:47808"));
        assert_eq!(device.vendor_id, Some(260));
        assert_eq!(device.properties.object_name.as_deref(), Some("AHU-1"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn record_i_am_keeps_apdu_and_segmentation() {
        let (_, registry) = registry();
        let i_am = IAmRequest {
            device_id: ObjectId::new(ObjectType::Device, 77),
            max_apdu: 480,
            segmentation: Segmentation::SegmentedBoth,
            vendor_id: 15,
        };
        let device = registry.record_i_am(&i_am, addr("10.0.0.7:47808")).unwrap();
        assert_eq!(device.max_apdu, Some(480));
        assert_eq!(device.segmentation, Some(Segmentation::SegmentedBoth));

        let not_a_device = IAmRequest {
            device_id: ObjectId::new(ObjectType::AnalogValue, 77),
            ..i_am
        };
        assert!(registry.record_i_am(&not_a_device, addr("10.0.0.8:47808")).is_none());
    }

    #[test]
    fn all_is_a_sorted_snapshot() {
        let (_, registry) = registry();
        registry.register(instance(30), addr("10.0.0.30:47808"));
        registry.register(instance(10), addr("10.0.0.10:47808"));
        let snapshot = registry.all();
        registry.register(instance(20), addr("10.0.0.20:47808"));

        let ids: Vec<u32> = snapshot.iter().map(|d| d.instance.get()).collect();
        assert_eq!(ids, vec![10, 30]);
        assert_eq!(registry.all().len(), 3);
    }

    #[test]
    fn seen_since_and_stale_eviction_follow_the_clock() {
        let (clock, registry) = registry();
        registry.register(instance(1), addr("10.0.0.1:47808"));
        clock.advance(Duration::from_secs(60));
        let mark = clock.now();
        registry.record_iam(instance(2), addr("10.0.0.2:47808"), 7);

        let recent: Vec<u32> = registry.seen_since(mark).iter().map(|d| d.instance.get()).collect();
        assert_eq!(recent, vec![2]);

        assert_eq!(registry.evict_stale(Duration::from_secs(30)), 1);
        assert!(registry.lookup(instance(1)).is_none());
        assert!(registry.lookup(instance(2)).is_some());
    }

    #[test]
    fn evict_and_update_unknown() {
        let (_, registry) = registry();
        assert!(!registry.update_properties(instance(5), DeviceProperties::default()));
        registry.register(instance(5), addr("10.0.0.5:47808"));
        assert_eq!(registry.evict(instance(5)).unwrap().instance, instance(5));
        assert!(registry.is_empty());
        assert!(registry.evict(instance(5)).is_none());
    }
}
