//! Unit tests for the volume identity codec.

use rstest::{fixture, rstest};
use serde_json::{Value, json};

use super::*;

const GKE_HANDLE: &str =
    "projects/velero-gcp/zones/us-central1-f/disks/pvc-a970184f-6cc1-4769-85ad-61dcaf8bf51d";
const RESTORED_ID: &str = "restore-fd9729b5-868b-4544-9568-1c5d9121dabc";

#[fixture]
fn codec() -> VolumeIdCodec {
    VolumeIdCodec::new(CsiDriverSet::default(), "velero-gcp")
}

fn csi_pv(driver: &str, handle: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "PersistentVolume",
        "metadata": {"name": "pvc-a970184f"},
        "spec": {
            "csi": {
                "driver": driver,
                "fsType": "ext4",
                "volumeAttributes": {
                    "storage.kubernetes.io/csiProvisionerIdentity": "1637243273131-8081-pd.csi.storage.gke.io"
                },
                "volumeHandle": handle
            }
        }
    })
}

fn in_tree_pv(disk: Value) -> Value {
    json!({"spec": {"gcePersistentDisk": disk}})
}

#[rstest]
fn get_returns_none_without_a_source_block(codec: VolumeIdCodec) {
    assert_eq!(codec.get_volume_id(&json!({})), Ok(None));
    assert_eq!(codec.get_volume_id(&json!({"spec": {}})), Ok(None));
}

#[rstest]
fn get_rejects_in_tree_block_without_disk_name(codec: VolumeIdCodec) {
    let pv = in_tree_pv(json!({}));
    assert_eq!(codec.get_volume_id(&pv), Err(VolumeIdError::MissingDiskName));
}

#[rstest]
fn get_reads_in_tree_disk_name(codec: VolumeIdCodec) {
    let pv = in_tree_pv(json!({"pdName": "abc123", "fsType": "ext4"}));
    assert_eq!(codec.get_volume_id(&pv), Ok(Some(String::from("abc123"))));
}

#[rstest]
#[case(PD_CSI_DRIVER)]
#[case(CONFIDENTIAL_CSI_DRIVER)]
fn get_reads_disk_name_from_supported_csi_handle(codec: VolumeIdCodec, #[case] driver: &str) {
    let pv = csi_pv(driver, GKE_HANDLE);
    assert_eq!(
        codec.get_volume_id(&pv),
        Ok(Some(String::from("pvc-a970184f-6cc1-4769-85ad-61dcaf8bf51d")))
    );
}

#[rstest]
fn get_reads_regional_csi_handle(codec: VolumeIdCodec) {
    let pv = csi_pv(PD_CSI_DRIVER, "projects/velero-gcp/regions/us-central1/disks/pvc-1");
    assert_eq!(codec.get_volume_id(&pv), Ok(Some(String::from("pvc-1"))));
}

#[rstest]
fn get_rejects_invalid_handle_for_supported_driver(codec: VolumeIdCodec) {
    let pv = csi_pv(PD_CSI_DRIVER, "pvc-a970184f-6cc1-4769-85ad-61dcaf8bf51d");
    let err = codec.get_volume_id(&pv).expect_err("invalid handle");
    assert_eq!(
        err,
        VolumeIdError::InvalidHandle {
            driver: String::from(PD_CSI_DRIVER),
            handle: String::from("pvc-a970184f-6cc1-4769-85ad-61dcaf8bf51d"),
        }
    );
    assert!(err.to_string().contains(PD_CSI_DRIVER));
}

#[rstest]
fn get_skips_unknown_csi_driver(codec: VolumeIdCodec) {
    let pv = csi_pv("xxx.csi.storage.gke.io", "pvc-a970184f-6cc1-4769-85ad-61dcaf8bf51d");
    assert_eq!(codec.get_volume_id(&pv), Ok(None));
}

#[rstest]
fn get_reports_undecodable_documents(codec: VolumeIdCodec) {
    let pv = json!({"spec": "not-an-object"});
    assert!(matches!(
        codec.get_volume_id(&pv),
        Err(VolumeIdError::Malformed(_))
    ));
}

#[rstest]
fn set_rejects_volume_without_source_block(codec: VolumeIdCodec) {
    assert_eq!(
        codec.set_volume_id(&json!({}), "abc123"),
        Err(VolumeIdError::MissingVolumeSource)
    );
}

#[rstest]
fn set_writes_in_tree_disk_name(codec: VolumeIdCodec) {
    let pv = in_tree_pv(json!({}));
    let updated = codec.set_volume_id(&pv, "123abc").expect("in-tree rewrite");
    assert_eq!(
        updated.pointer("/spec/gcePersistentDisk/pdName"),
        Some(&json!("123abc"))
    );
}

#[rstest]
fn set_replaces_only_the_disk_segment_in_same_project(codec: VolumeIdCodec) {
    let pv = csi_pv(PD_CSI_DRIVER, GKE_HANDLE);
    let updated = codec.set_volume_id(&pv, RESTORED_ID).expect("csi rewrite");
    assert_eq!(
        updated.pointer("/spec/csi/volumeHandle"),
        Some(&json!(format!(
            "projects/velero-gcp/zones/us-central1-f/disks/{RESTORED_ID}"
        )))
    );
    assert_eq!(
        updated.pointer("/spec/csi/fsType"),
        Some(&json!("ext4")),
        "unrelated fields survive the rewrite"
    );
    assert_eq!(updated.pointer("/metadata/name"), Some(&json!("pvc-a970184f")));
}

#[rstest]
fn set_moves_cross_project_handle_into_volume_project() {
    let codec = VolumeIdCodec::new(CsiDriverSet::default(), "p2");
    let pv = csi_pv(PD_CSI_DRIVER, "projects/p1/zones/us-central1-f/disks/name1");
    let updated = codec.set_volume_id(&pv, "name2").expect("csi rewrite");
    assert_eq!(
        updated.pointer("/spec/csi/volumeHandle"),
        Some(&json!("projects/p2/zones/us-central1-f/disks/name2"))
    );
}

#[rstest]
fn set_rejects_invalid_handle_for_supported_driver(codec: VolumeIdCodec) {
    let pv = csi_pv(PD_CSI_DRIVER, "pvc-a970184f-6cc1-4769-85ad-61dcaf8bf51d");
    assert!(matches!(
        codec.set_volume_id(&pv, RESTORED_ID),
        Err(VolumeIdError::InvalidHandle { .. })
    ));
}

#[rstest]
fn set_rejects_unknown_csi_driver(codec: VolumeIdCodec) {
    let pv = csi_pv("xxx.csi.storage.gke.io", GKE_HANDLE);
    assert_eq!(
        codec.set_volume_id(&pv, RESTORED_ID),
        Err(VolumeIdError::UnsupportedDriver {
            driver: String::from("xxx.csi.storage.gke.io")
        })
    );
}

#[rstest]
fn injected_driver_becomes_supported() {
    let codec = VolumeIdCodec::new(
        CsiDriverSet::default().with_driver("xxx.csi.storage.gke.io"),
        "velero-gcp",
    );
    let pv = csi_pv("xxx.csi.storage.gke.io", GKE_HANDLE);
    assert_eq!(
        codec.get_volume_id(&pv),
        Ok(Some(String::from("pvc-a970184f-6cc1-4769-85ad-61dcaf8bf51d")))
    );
}

#[rstest]
#[case(csi_pv(PD_CSI_DRIVER, GKE_HANDLE))]
#[case(csi_pv(PD_CSI_DRIVER, "projects/elsewhere/regions/us-east1/disks/old"))]
#[case(in_tree_pv(json!({"pdName": "old"})))]
fn set_then_get_round_trips(codec: VolumeIdCodec, #[case] pv: Value) {
    let updated = codec.set_volume_id(&pv, RESTORED_ID).expect("rewrite");
    assert_eq!(
        codec.get_volume_id(&updated),
        Ok(Some(String::from(RESTORED_ID)))
    );
}

#[rstest]
#[case("projects/velero-gcp/zones/z/disks/d", false)]
#[case("projects/other/zones/z/disks/d", true)]
#[case("bare-disk-name", false)]
#[case("", false)]
fn cross_project_detection(codec: VolumeIdCodec, #[case] handle: &str, #[case] expected: bool) {
    assert_eq!(codec.is_created_cross_project(handle), expected);
}

#[test]
fn classify_prefers_csi_over_in_tree_block() {
    let pv = json!({
        "spec": {
            "csi": {"driver": PD_CSI_DRIVER, "volumeHandle": GKE_HANDLE},
            "gcePersistentDisk": {"pdName": "legacy"}
        }
    });
    let source = VolumeSource::classify(&pv, &CsiDriverSet::default()).expect("classify");
    assert!(matches!(source, VolumeSource::Csi { .. }));
}

#[test]
fn default_driver_set_lists_gke_drivers() {
    let set = CsiDriverSet::default();
    let drivers: Vec<&str> = set.iter().collect();
    assert_eq!(drivers, vec![CONFIDENTIAL_CSI_DRIVER, PD_CSI_DRIVER]);
}
