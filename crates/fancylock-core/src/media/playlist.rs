//! Shuffled, de-duplicated playlist assignment across monitors

use std::collections::HashMap;
use std::path::PathBuf;

use rand::seq::SliceRandom;
use rand::Rng;

use super::MediaFile;

/// Smallest playlist a monitor may get: half the pool, at least one file
pub fn min_playlist_len(pool_size: usize) -> usize {
    (pool_size / 2).max(1).min(pool_size)
}

/// Split `pool` into one shuffled playlist per monitor.
///
/// Files are dealt without repetition, each to the currently shortest
/// playlist. A file that `now_playing` reports on a monitor stays with that
/// monitor. Any playlist shorter than [`min_playlist_len`] is then backfilled
/// from the pool, preferring files not playing elsewhere; only this step
/// duplicates files across monitors, and only when the pool is too small to
/// avoid it.
pub fn assign_playlists<R: Rng + ?Sized>(
    pool: &[MediaFile],
    monitors: usize,
    now_playing: &HashMap<usize, PathBuf>,
    rng: &mut R,
) -> Vec<Vec<MediaFile>> {
    let mut lists: Vec<Vec<MediaFile>> = vec![Vec::new(); monitors];
    if monitors == 0 || pool.is_empty() {
        return lists;
    }

    let mut shuffled = pool.to_vec();
    shuffled.shuffle(rng);

    let owner = |file: &MediaFile| {
        now_playing
            .iter()
            .filter(|(monitor, path)| **monitor < monitors && **path == file.path)
            .map(|(monitor, _)| *monitor)
            .min()
    };

    let (owned, free): (Vec<_>, Vec<_>) = shuffled.into_iter().partition(|f| owner(f).is_some());

    for file in owned {
        if let Some(monitor) = owner(&file) {
            lists[monitor].push(file);
        }
    }

    for file in free {
        let shortest = (0..monitors)
            .min_by_key(|monitor| lists[*monitor].len())
            .unwrap_or(0);
        lists[shortest].push(file);
    }

    let min_len = min_playlist_len(pool.len());
    for (monitor, list) in lists.iter_mut().enumerate() {
        if list.len() >= min_len {
            continue;
        }

        let playing_elsewhere = |file: &MediaFile| {
            now_playing
                .iter()
                .any(|(other, path)| *other != monitor && *path == file.path)
        };

        let mut candidates: Vec<&MediaFile> =
            pool.iter().filter(|file| !list.contains(*file)).collect();
        candidates.shuffle(rng);
        // Stable sort keeps the shuffle within each group
        candidates.sort_by_key(|file| playing_elsewhere(*file));

        let missing = min_len - list.len();
        list.extend(candidates.into_iter().take(missing).cloned());
    }

    for list in &mut lists {
        list.shuffle(rng);
    }

    lists
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn pool(n: usize) -> Vec<MediaFile> {
        (0..n)
            .map(|i| MediaFile::new(format!("/media/clip{}.mp4", i), MediaKind::Video))
            .collect()
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_min_playlist_len() {
        assert_eq!(min_playlist_len(0), 0);
        assert_eq!(min_playlist_len(1), 1);
        assert_eq!(min_playlist_len(3), 1);
        assert_eq!(min_playlist_len(10), 5);
    }

    #[test]
    fn test_two_monitors_three_files() {
        let lists = assign_playlists(&pool(3), 2, &HashMap::new(), &mut rng());

        assert_eq!(lists.len(), 2);
        assert!(lists.iter().all(|l| !l.is_empty()));

        let all: Vec<_> = lists.iter().flatten().map(|f| f.path.clone()).collect();
        let unique: HashSet<_> = all.iter().cloned().collect();
        assert_eq!(all.len(), unique.len());
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_small_pool_backfills_with_duplicates() {
        let lists = assign_playlists(&pool(2), 4, &HashMap::new(), &mut rng());
        assert_eq!(lists.len(), 4);
        assert!(lists.iter().all(|l| l.len() == 1));
    }

    #[test]
    fn test_single_monitor_gets_everything() {
        let lists = assign_playlists(&pool(6), 1, &HashMap::new(), &mut rng());
        assert_eq!(lists[0].len(), 6);
    }

    #[test]
    fn test_now_playing_stays_with_its_monitor() {
        let files = pool(6);
        let mut now_playing = HashMap::new();
        now_playing.insert(0, files[4].path.clone());
        now_playing.insert(1, files[1].path.clone());

        let lists = assign_playlists(&files, 2, &now_playing, &mut rng());
        assert!(lists[0].contains(&files[4]));
        assert!(lists[1].contains(&files[1]));
        assert!(!lists[1].contains(&files[4]));
        assert!(!lists[0].contains(&files[1]));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(assign_playlists(&pool(3), 0, &HashMap::new(), &mut rng()).is_empty());
        let lists = assign_playlists(&[], 2, &HashMap::new(), &mut rng());
        assert_eq!(lists, vec![Vec::<MediaFile>::new(), Vec::new()]);
    }
}
