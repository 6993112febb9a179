//! Pruebas de integración contra MySQL real.
//! Se saltan (silenciosamente) si DATABASE_URL no está definida.


use cp_core::traits::{DiffStore, StoreError};
use cp_domain::{MwTimestamp, NewDiff, NewSource, Site, Status};
use cp_persistence::MysqlDiffStore;
use test_support::with_pool;
use uuid::Uuid;

fn sample(rev_id: u32) -> NewDiff {
    NewDiff { site: Site::new("wikipedia", "en"),
              page_namespace: 0,
              page_title: "Kommet,_ihr_Hirten".into(),
              rev_id,
              rev_parent_id: 1125722395,
              rev_timestamp: MwTimestamp::from_mw("20221202021222").unwrap(),
              rev_user_text: "Éxàmþlë editor".into() }
}

#[test]
fn diff_roundtrip() {
    with_pool(|pool| {
        let store = MysqlDiffStore::from_pool(pool.clone());
        store.create_tables().unwrap();
        let site = Site::new("wikipedia", "en");
        store.remove_revision(&site, 910_000_001).unwrap();

        store.add_revision(sample(910_000_001)).unwrap();
        let rows = store.diffs_by_status(&[Status::Unsubmitted]).unwrap();
        let diff = rows.iter().find(|d| d.rev_id == 910_000_001).expect("inserted row");
        assert_eq!(diff.site, site);
        assert_eq!(diff.page_title, "Kommet,_ihr_Hirten");
        assert_eq!(diff.rev_parent_id, 1125722395);
        assert_eq!(diff.rev_timestamp, MwTimestamp::from_mw("20221202021222").unwrap());
        assert_eq!(diff.rev_user_text, "Éxàmþlë editor");
        assert_eq!(diff.status, Status::Unsubmitted);
        assert!(diff.submission_id.is_none());
        assert!(diff.sources.is_empty());

        store.remove_revision(&site, 910_000_001).unwrap();
    });
}

#[test]
fn duplicate_revision_is_rejected() {
    with_pool(|pool| {
        let store = MysqlDiffStore::from_pool(pool.clone());
        store.create_tables().unwrap();
        let site = Site::new("wikipedia", "en");
        store.remove_revision(&site, 910_000_002).unwrap();

        store.add_revision(sample(910_000_002)).unwrap();
        assert!(matches!(store.add_revision(sample(910_000_002)), Err(StoreError::Duplicate)));

        store.remove_revision(&site, 910_000_002).unwrap();
    });
}

#[test]
fn lifecycle_to_ready_and_cascade() {
    with_pool(|pool| {
        let store = MysqlDiffStore::from_pool(pool.clone());
        store.create_tables().unwrap();
        let site = Site::new("wikipedia", "en");
        store.remove_revision(&site, 910_000_003).unwrap();

        store.add_revision(sample(910_000_003)).unwrap();
        let diff_id = store.diffs_by_status(&[Status::Unsubmitted])
                           .unwrap()
                           .into_iter()
                           .find(|d| d.rev_id == 910_000_003)
                           .unwrap()
                           .diff_id;

        let sid = Uuid::new_v4();
        store.set_submission(diff_id, sid).unwrap();
        store.set_status(diff_id, Status::Uploaded).unwrap();
        store.set_status(diff_id, Status::Pending).unwrap();
        store.save_sources(diff_id,
                           sid,
                           &[NewSource { description: "a matching page".into(),
                                         url: Some("http://www.reindeerland.org/c.htm".into()),
                                         percent: 89.28571 },
                             NewSource { description: "no url source".into(), url: None, percent: 75.0 }])
             .unwrap();

        let rows = store.diffs_by_status(&[Status::Ready]).unwrap();
        let diff = rows.iter().find(|d| d.diff_id == diff_id).expect("ready row");
        assert_eq!(diff.submission_id, Some(sid));
        assert!(diff.status_timestamp.is_some());
        assert_eq!(diff.sources.len(), 2);
        assert!((diff.sources[0].percent - 89.28571).abs() < 1e-4);
        assert_eq!(diff.sources[1].url, None);

        // el borrado por submission arrastra las fuentes por la FK
        assert_eq!(store.remove_submission(sid).unwrap(), 1);
        assert!(store.diffs_by_status(&[Status::Ready])
                     .unwrap()
                     .iter()
                     .all(|d| d.diff_id != diff_id));
    });
}

#[test]
fn reset_submission_returns_to_unsubmitted() {
    with_pool(|pool| {
        let store = MysqlDiffStore::from_pool(pool.clone());
        store.create_tables().unwrap();
        let site = Site::new("wikipedia", "en");
        store.remove_revision(&site, 910_000_004).unwrap();

        store.add_revision(sample(910_000_004)).unwrap();
        let diff_id = store.diffs_by_status(&[Status::Unsubmitted])
                           .unwrap()
                           .into_iter()
                           .find(|d| d.rev_id == 910_000_004)
                           .unwrap()
                           .diff_id;
        store.set_submission(diff_id, Uuid::new_v4()).unwrap();
        store.reset_submission(diff_id).unwrap();

        let rows = store.diffs_by_status(&[Status::Unsubmitted]).unwrap();
        let diff = rows.iter().find(|d| d.diff_id == diff_id).unwrap();
        assert!(diff.submission_id.is_none());
        assert_eq!(diff.status, Status::Unsubmitted);

        store.remove_revision(&site, 910_000_004).unwrap();
    });
}
