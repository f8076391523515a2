use crate::annotation::{AnnotationRecord, Point};
use crate::error::{LabelError, Result};
use crate::scanner;
use image::RgbaImage;
use std::fs;
use std::path::{Path, PathBuf};

pub const MAX_RECENT_FILES: usize = 7;

/// The image currently on the canvas.
pub struct OpenImage {
    pub index: usize,
    pub pixels: RgbaImage,
}

/// Which image is open and which points have been placed on it.
///
/// `current` always indexes into `images`, and `points` always belong to
/// `current`: they are cleared whenever the open image changes. Every
/// operation either succeeds or leaves the session exactly as it was.
pub struct Session {
    extensions: Vec<&'static str>,
    images: Vec<PathBuf>,
    current: Option<OpenImage>,
    points: Vec<Point>,
    save_dir: Option<PathBuf>,
    last_open_dir: Option<PathBuf>,
    recent_files: Vec<PathBuf>,
    generation: u64,
}

impl Session {
    pub fn new(extensions: Vec<&'static str>) -> Self {
        Self {
            extensions,
            images: Vec::new(),
            current: None,
            points: Vec::new(),
            save_dir: None,
            last_open_dir: None,
            recent_files: Vec::new(),
            generation: 0,
        }
    }

    pub fn extensions(&self) -> &[&'static str] {
        &self.extensions
    }

    pub fn images(&self) -> &[PathBuf] {
        &self.images
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current.as_ref().map(|open| open.index)
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current_index().map(|i| self.images[i].as_path())
    }

    pub fn current_image(&self) -> Option<&RgbaImage> {
        self.current.as_ref().map(|open| &open.pixels)
    }

    /// Bumped whenever the open image changes, so the view knows when to
    /// upload a fresh texture.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn save_dir(&self) -> Option<&Path> {
        self.save_dir.as_deref()
    }

    pub fn set_save_dir(&mut self, dir: &Path) -> Result<()> {
        if !dir.is_dir() {
            return Err(LabelError::DirectoryNotFound(dir.to_path_buf()));
        }
        log::info!("Annotations will be saved to {}", dir.display());
        self.save_dir = Some(dir.to_path_buf());
        Ok(())
    }

    pub fn last_open_dir(&self) -> Option<&Path> {
        self.last_open_dir.as_deref()
    }

    pub fn set_last_open_dir(&mut self, dir: Option<PathBuf>) {
        self.last_open_dir = dir;
    }

    pub fn recent_files(&self) -> &[PathBuf] {
        &self.recent_files
    }

    pub fn set_recent_files(&mut self, mut files: Vec<PathBuf>) {
        files.truncate(MAX_RECENT_FILES);
        self.recent_files = files;
    }

    /// Scans `dir`, replaces the image list and opens its first entry.
    ///
    /// A failed scan changes nothing. Once the scan succeeds the new list is
    /// kept even if the first image then fails to decode.
    pub fn open_directory(&mut self, dir: &Path) -> Result<()> {
        let images = scanner::scan_images(dir, &self.extensions)?;
        self.images = images;
        self.current = None;
        self.points.clear();
        self.generation += 1;
        self.last_open_dir = Some(dir.to_path_buf());
        if self.images.is_empty() {
            return Ok(());
        }
        self.open_index(0)
    }

    /// Opens an entry of the current image list.
    pub fn open_image(&mut self, path: &Path) -> Result<()> {
        let index = self
            .images
            .iter()
            .position(|p| p == path)
            .ok_or_else(|| LabelError::NotInList(path.to_path_buf()))?;
        self.open_index(index)
    }

    /// Opens any image on disk. Files outside the current list bring their
    /// whole directory in as the new list.
    pub fn open_file(&mut self, path: &Path) -> Result<()> {
        if self.images.iter().any(|p| p == path) {
            return self.open_image(path);
        }

        let path = scanner::absolute(path)?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| LabelError::NotInList(path.clone()))?;
        let images = scanner::scan_images(&dir, &self.extensions)?;
        let index = images
            .iter()
            .position(|p| *p == path)
            .ok_or_else(|| LabelError::NotInList(path.clone()))?;
        let pixels = decode(&path)?;

        self.images = images;
        self.last_open_dir = Some(dir);
        self.install(index, pixels);
        Ok(())
    }

    /// Opens the image a label file refers to and restores its points.
    ///
    /// The image is looked up next to the label file first, then by name in
    /// the current list.
    pub fn open_label_file(&mut self, label: &Path) -> Result<()> {
        let record = AnnotationRecord::read(label)?;
        let beside = label
            .parent()
            .map(|dir| dir.join(&record.filename))
            .filter(|p| p.is_file());

        if let Some(image) = beside {
            self.open_file(&image)?;
        } else {
            let listed = self
                .images
                .iter()
                .find(|p| p.file_name().is_some_and(|n| n.to_string_lossy() == record.filename))
                .cloned()
                .ok_or_else(|| LabelError::NotInList(PathBuf::from(&record.filename)))?;
            self.open_image(&listed)?;
        }

        self.points = record.points;
        Ok(())
    }

    /// Moves one entry forward. With nothing open yet this opens the first
    /// entry. Returns `false` when there is nowhere to go.
    pub fn open_next(&mut self) -> Result<bool> {
        let next = match self.current_index() {
            None => 0,
            Some(i) => i + 1,
        };
        if next >= self.images.len() {
            return Ok(false);
        }
        self.open_index(next)?;
        Ok(true)
    }

    pub fn open_prev(&mut self) -> Result<bool> {
        match self.current_index() {
            Some(i) if i > 0 => {
                self.open_index(i - 1)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Returns `false` when no image is open to receive the point.
    pub fn add_point(&mut self, point: Point) -> bool {
        if self.current.is_none() {
            log::debug!("Ignoring point {:?} with no image open", point);
            return false;
        }
        self.points.push(point);
        true
    }

    /// Removes the point closest to `near` if it lies within `radius` pixels.
    pub fn remove_point_near(&mut self, near: Point, radius: f32) -> Option<Point> {
        let distance = |p: &Point| {
            let dx = (i64::from(p.x) - i64::from(near.x)) as f32;
            let dy = (i64::from(p.y) - i64::from(near.y)) as f32;
            (dx * dx + dy * dy).sqrt()
        };
        let (index, _) = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, distance(p)))
            .filter(|(_, d)| *d <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))?;
        Some(self.points.remove(index))
    }

    pub fn reset_points(&mut self) {
        self.points.clear();
    }

    /// What a save right now would write, taken before any state changes.
    pub fn snapshot(&self) -> Option<AnnotationRecord> {
        let filename = self.current_path()?.file_name()?.to_string_lossy().into_owned();
        Some(AnnotationRecord::new(filename, self.points.clone()))
    }

    fn open_index(&mut self, index: usize) -> Result<()> {
        let pixels = decode(&self.images[index])?;
        self.install(index, pixels);
        Ok(())
    }

    fn install(&mut self, index: usize, pixels: RgbaImage) {
        let path = self.images[index].clone();
        log::info!("Loaded {} ({}x{})", path.display(), pixels.width(), pixels.height());
        self.current = Some(OpenImage { index, pixels });
        self.points.clear();
        self.generation += 1;
        self.add_recent_file(path);
    }

    fn add_recent_file(&mut self, path: PathBuf) {
        if let Some(pos) = self.recent_files.iter().position(|p| *p == path) {
            self.recent_files.remove(pos);
        } else if self.recent_files.len() >= MAX_RECENT_FILES {
            self.recent_files.pop();
        }
        self.recent_files.insert(0, path);
    }
}

/// Reads and decodes an image. Unreadable files count as invalid images.
pub fn decode(path: &Path) -> Result<RgbaImage> {
    let invalid = |source: image::ImageError| LabelError::InvalidImage {
        path: path.to_path_buf(),
        source,
    };
    let bytes = fs::read(path).map_err(|e| invalid(image::ImageError::IoError(e)))?;
    let decoded = image::load_from_memory(&bytes).map_err(invalid)?;
    Ok(decoded.to_rgba8())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn write_png(path: &Path, width: u32, height: u32) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        RgbaImage::new(width, height).save(path).unwrap();
    }

    /// A directory with `names` as small PNGs, plus one non-image file.
    pub(crate) fn image_dir(names: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            write_png(&dir.path().join(name), 4, 3);
        }
        fs::write(dir.path().join("notes.md"), "not an image").unwrap();
        dir
    }

    fn session() -> Session {
        Session::new(scanner::supported_extensions())
    }

    fn current_name(session: &Session) -> String {
        session
            .current_path()
            .unwrap()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn test_open_directory_opens_first() {
        let dir = image_dir(&["b.png", "a.png", "sub/c.png"]);
        let mut session = session();

        session.open_directory(dir.path()).unwrap();

        assert_eq!(session.images().len(), 3);
        assert_eq!(session.current_index(), Some(0));
        assert_eq!(current_name(&session), "a.png");
        assert_eq!(session.current_image().unwrap().dimensions(), (4, 3));
        assert!(session.points().is_empty());
        assert_eq!(session.last_open_dir(), Some(dir.path()));
    }

    #[test]
    fn test_open_empty_directory() {
        let dir = image_dir(&[]);
        let mut session = session();
        session.open_directory(dir.path()).unwrap();
        assert!(session.images().is_empty());
        assert_eq!(session.current_index(), None);
        assert!(!session.open_next().unwrap());
        assert!(!session.open_prev().unwrap());
    }

    #[test]
    fn test_open_missing_directory_keeps_state() {
        let dir = image_dir(&["a.png", "b.png"]);
        let mut session = session();
        session.open_directory(dir.path()).unwrap();
        session.open_next().unwrap();
        session.add_point(Point::new(1, 2));

        let err = session.open_directory(&dir.path().join("gone")).unwrap_err();

        assert!(matches!(err, LabelError::DirectoryNotFound(_)));
        assert_eq!(session.images().len(), 2);
        assert_eq!(session.current_index(), Some(1));
        assert_eq!(session.points(), &[Point::new(1, 2)]);
    }

    #[test]
    fn test_next_visits_every_entry_once() {
        let dir = image_dir(&["c.png", "A.png", "b.png", "deep/d.png"]);
        let mut session = session();
        session.open_directory(dir.path()).unwrap();

        let mut visited = vec![session.current_path().unwrap().to_path_buf()];
        while session.open_next().unwrap() {
            visited.push(session.current_path().unwrap().to_path_buf());
        }

        assert_eq!(visited, session.images());
        assert!(!session.open_next().unwrap());
        assert_eq!(session.current_index(), Some(3));
    }

    #[test]
    fn test_prev_moves_back_one() {
        let dir = image_dir(&["a.png", "b.png", "c.png"]);
        let mut session = session();
        session.open_directory(dir.path()).unwrap();

        assert!(!session.open_prev().unwrap());
        assert_eq!(session.current_index(), Some(0));

        session.open_next().unwrap();
        session.open_next().unwrap();
        assert!(session.open_prev().unwrap());
        assert_eq!(session.current_index(), Some(1));
    }

    #[test]
    fn test_navigation_clears_points() {
        let dir = image_dir(&["a.png", "b.png"]);
        let mut session = session();
        session.open_directory(dir.path()).unwrap();
        session.add_point(Point::new(1, 1));
        session.add_point(Point::new(2, 2));

        session.open_next().unwrap();
        assert!(session.points().is_empty());

        session.add_point(Point::new(3, 3));
        session.open_prev().unwrap();
        assert!(session.points().is_empty());
    }

    #[test]
    fn test_open_image_not_in_list() {
        let dir = image_dir(&["a.png"]);
        let other = image_dir(&["z.png"]);
        let mut session = session();
        session.open_directory(dir.path()).unwrap();
        session.add_point(Point::new(5, 5));

        let outsider = other.path().join("z.png");
        let err = session.open_image(&outsider).unwrap_err();

        assert!(matches!(err, LabelError::NotInList(p) if p == outsider));
        assert_eq!(current_name(&session), "a.png");
        assert_eq!(session.points(), &[Point::new(5, 5)]);
    }

    #[test]
    fn test_invalid_image_leaves_previous_open() {
        let dir = image_dir(&["a.png"]);
        fs::write(dir.path().join("broken.png"), b"definitely not a png").unwrap();
        let mut session = session();
        session.open_directory(dir.path()).unwrap();
        session.add_point(Point::new(3, 4));
        let generation = session.generation();

        let err = session.open_next().unwrap_err();

        assert!(matches!(err, LabelError::InvalidImage { .. }));
        assert_eq!(current_name(&session), "a.png");
        assert_eq!(session.points(), &[Point::new(3, 4)]);
        assert_eq!(session.generation(), generation);
    }

    #[test]
    fn test_open_file_outside_list_loads_its_directory() {
        let dir = image_dir(&["a.png", "b.png", "c.png"]);
        let mut session = session();

        session.open_file(&dir.path().join("b.png")).unwrap();

        assert_eq!(session.images().len(), 3);
        assert_eq!(current_name(&session), "b.png");
        assert_eq!(session.last_open_dir(), Some(dir.path()));
    }

    #[test]
    fn test_open_file_rejects_unsupported() {
        let dir = image_dir(&["a.png"]);
        let mut session = session();
        let err = session.open_file(&dir.path().join("notes.md")).unwrap_err();
        assert!(matches!(err, LabelError::NotInList(_)));
        assert!(session.images().is_empty());
    }

    #[test]
    fn test_open_label_file_restores_points() {
        let dir = image_dir(&["cat.png", "dog.png"]);
        let label = dir.path().join("cat.txt");
        fs::write(&label, "cat.png 3 4 10 20").unwrap();
        let mut session = session();

        session.open_label_file(&label).unwrap();

        assert_eq!(current_name(&session), "cat.png");
        assert_eq!(session.points(), &[Point::new(3, 4), Point::new(10, 20)]);
    }

    #[test]
    fn test_open_label_file_finds_image_in_list() {
        let images = image_dir(&["cat.png"]);
        let labels = tempfile::tempdir().unwrap();
        let label = labels.path().join("cat.txt");
        fs::write(&label, "cat.png 1 2").unwrap();
        let mut session = session();
        session.open_directory(images.path()).unwrap();

        session.open_label_file(&label).unwrap();

        assert_eq!(session.points(), &[Point::new(1, 2)]);
    }

    #[test]
    fn test_add_point_needs_open_image() {
        let mut session = session();
        assert!(!session.add_point(Point::new(1, 1)));
        assert!(session.points().is_empty());
    }

    #[test]
    fn test_reset_points_keeps_image() {
        let dir = image_dir(&["a.png", "b.png"]);
        let mut session = session();
        session.open_directory(dir.path()).unwrap();
        session.open_next().unwrap();
        session.add_point(Point::new(1, 1));

        session.reset_points();

        assert!(session.points().is_empty());
        assert_eq!(session.current_index(), Some(1));
    }

    #[test]
    fn test_remove_point_near() {
        let dir = image_dir(&["a.png"]);
        let mut session = session();
        session.open_directory(dir.path()).unwrap();
        session.add_point(Point::new(10, 10));
        session.add_point(Point::new(50, 50));

        assert_eq!(session.remove_point_near(Point::new(30, 30), 5.0), None);
        assert_eq!(
            session.remove_point_near(Point::new(48, 51), 5.0),
            Some(Point::new(50, 50))
        );
        assert_eq!(session.points(), &[Point::new(10, 10)]);
    }

    #[test]
    fn test_remove_point_near_extreme_coordinates() {
        let dir = image_dir(&["cat.png"]);
        let label = dir.path().join("cat.txt");
        fs::write(&label, format!("cat.png {} 0 {} 5", i32::MIN, i32::MAX)).unwrap();
        let mut session = session();
        session.open_label_file(&label).unwrap();

        assert_eq!(session.remove_point_near(Point::new(3, 0), 10.0), None);
        assert_eq!(
            session.remove_point_near(Point::new(i32::MAX - 2, 5), 10.0),
            Some(Point::new(i32::MAX, 5))
        );
        assert_eq!(session.points(), &[Point::new(i32::MIN, 0)]);
    }

    #[test]
    fn test_label_file_with_spaced_image_name() {
        let dir = image_dir(&["my cat.png"]);
        let out = tempfile::tempdir().unwrap();
        let mut session = session();
        session.open_directory(dir.path()).unwrap();
        session.add_point(Point::new(3, 4));
        let written = session.snapshot().unwrap().write(out.path()).unwrap();
        fs::copy(&written, dir.path().join("my.txt")).unwrap();

        session.open_label_file(&dir.path().join("my.txt")).unwrap();

        assert_eq!(session.points(), &[Point::new(3, 4)]);
    }

    #[test]
    fn test_label_file_cannot_escape_its_directory() {
        let outside = image_dir(&["x.png"]);
        let labels = outside.path().join("labels");
        fs::create_dir(&labels).unwrap();
        let label = labels.join("x.txt");
        fs::write(&label, "../x.png 1 2").unwrap();
        let mut session = session();

        let err = session.open_label_file(&label).unwrap_err();

        assert!(matches!(err, LabelError::InvalidRecord { .. }));
        assert_eq!(session.current_index(), None);
    }

    #[test]
    fn test_snapshot_uses_file_name() {
        let dir = image_dir(&["cat.png"]);
        let mut session = session();
        assert!(session.snapshot().is_none());

        session.open_directory(dir.path()).unwrap();
        session.add_point(Point::new(3, 4));
        let record = session.snapshot().unwrap();

        assert_eq!(record.filename, "cat.png");
        assert_eq!(record.points, vec![Point::new(3, 4)]);
    }

    #[test]
    fn test_recent_files_are_capped_and_deduplicated() {
        let names: Vec<String> = (0..9).map(|i| format!("{i}.png")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let dir = image_dir(&refs);
        let mut session = session();
        session.open_directory(dir.path()).unwrap();
        while session.open_next().unwrap() {}
        session.open_prev().unwrap();

        let recent = session.recent_files();
        assert_eq!(recent.len(), MAX_RECENT_FILES);
        assert_eq!(recent[0], session.images()[7]);
        assert_eq!(recent[1], session.images()[8]);
        assert_eq!(recent.iter().filter(|p| **p == session.images()[7]).count(), 1);
    }

    #[test]
    fn test_set_save_dir_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session();
        session.set_save_dir(dir.path()).unwrap();
        let err = session.set_save_dir(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, LabelError::DirectoryNotFound(_)));
        assert_eq!(session.save_dir(), Some(dir.path()));
    }
}
