//! [`StorageVolume`] on top of an `embedded-sdmmc` volume manager
//!
//! Uses the raw-handle API so the adapter can hold the root directory open
//! between calls without borrowing the manager.

use embedded_sdmmc::{
    BlockDevice, Error, Mode, RawDirectory, RawFile, TimeSource, VolumeIdx, VolumeManager,
};

use super::StorageVolume;

/// FAT volume on an SD card
pub struct SdmmcVolume<D, T>
where
    D: BlockDevice,
    T: TimeSource,
{
    manager: VolumeManager<D, T>,
    volume: VolumeIdx,
    root: Option<RawDirectory>,
}

impl<D, T> SdmmcVolume<D, T>
where
    D: BlockDevice,
    T: TimeSource,
{
    /// Wrap a volume manager; `volume` selects the partition to mount
    pub fn new(manager: VolumeManager<D, T>, volume: VolumeIdx) -> Self {
        Self {
            manager,
            volume,
            root: None,
        }
    }

    fn root(&self) -> Result<RawDirectory, Error<D::Error>> {
        self.root.ok_or(Error::BadHandle)
    }

    fn open_in(&mut self, dir: &str, name: &str, mode: Mode) -> Result<RawFile, Error<D::Error>> {
        let root = self.root()?;
        let directory = self.manager.open_dir(root, dir)?;
        let file = self.manager.open_file_in_dir(directory, name, mode);
        self.manager.close_dir(directory)?;
        file
    }

    /// Consume the adapter and return the volume manager
    pub fn release(self) -> VolumeManager<D, T> {
        self.manager
    }
}

impl<D, T> StorageVolume for SdmmcVolume<D, T>
where
    D: BlockDevice,
    T: TimeSource,
{
    type Error = Error<D::Error>;
    type File = RawFile;

    fn mount(&mut self) -> Result<(), Self::Error> {
        let volume = self.manager.open_raw_volume(self.volume)?;
        self.root = Some(self.manager.open_root_dir(volume)?);
        Ok(())
    }

    fn count_root_dirs(&mut self) -> Result<usize, Self::Error> {
        let root = self.root()?;
        let mut count = 0;
        self.manager.iterate_dir(root, |entry| {
            if entry.attributes.is_directory() && !entry.attributes.is_volume() {
                count += 1;
            }
        })?;
        Ok(count)
    }

    fn create_dir(&mut self, name: &str) -> Result<(), Self::Error> {
        let root = self.root()?;
        self.manager.make_dir_in_dir(root, name)
    }

    fn create_file(&mut self, dir: &str, name: &str) -> Result<Self::File, Self::Error> {
        self.open_in(dir, name, Mode::ReadWriteCreate)
    }

    fn open_append(&mut self, dir: &str, name: &str) -> Result<Self::File, Self::Error> {
        self.open_in(dir, name, Mode::ReadWriteAppend)
    }

    fn write(&mut self, file: &mut Self::File, bytes: &[u8]) -> Result<(), Self::Error> {
        self.manager.write(*file, bytes)
    }

    fn close(&mut self, file: Self::File) -> Result<(), Self::Error> {
        self.manager.close_file(file)
    }
}
